//! Counters and Progress
//!
//! Advisory telemetry injected into the mapper, writer and merger.
//! Nothing in the crate branches on a counter value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// Monotonic counters maintained by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    // -------------------------------------------------------------------------
    // Record Mapping
    // -------------------------------------------------------------------------
    /// Total records read
    Records,
    /// Records that are neither `response` nor `request`
    SkippedRecords,
    /// Records above the configured maximum size
    SkippedRecordsTooLarge,
    /// Records below the configured minimum size
    SkippedRecordsTooSmall,
    /// Records with a body shorter than their `Content-Length`
    TruncatedRecords,
    /// Header blocks without a usable `Content-Length`
    MalformedRecords,
    /// Records whose payload was classified as binary
    BinaryRecords,
    /// JSON documents generated
    GeneratedDocs,

    // -------------------------------------------------------------------------
    // Partitioned Output
    // -------------------------------------------------------------------------
    DataEntries,
    UriEntries,
    /// Repeated keys dropped by the writer (first value wins)
    DuplicateKeys,

    // -------------------------------------------------------------------------
    // Merge
    // -------------------------------------------------------------------------
    ContainersToBeMerged,
    MergesFinished,
    EmptyInputContainers,
    InputsExhausted,
    EntriesWritten,
}

impl Counter {
    pub const ALL: [Counter; 16] = [
        Counter::Records,
        Counter::SkippedRecords,
        Counter::SkippedRecordsTooLarge,
        Counter::SkippedRecordsTooSmall,
        Counter::TruncatedRecords,
        Counter::MalformedRecords,
        Counter::BinaryRecords,
        Counter::GeneratedDocs,
        Counter::DataEntries,
        Counter::UriEntries,
        Counter::DuplicateKeys,
        Counter::ContainersToBeMerged,
        Counter::MergesFinished,
        Counter::EmptyInputContainers,
        Counter::InputsExhausted,
        Counter::EntriesWritten,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Capability to record counter increments
pub trait CounterSink: Send + Sync {
    fn increment(&self, counter: Counter, by: u64);
}

/// Lock-free counter array
#[derive(Debug, Default)]
pub struct Counters {
    values: [AtomicU64; Counter::ALL.len()],
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.values[counter.index()].load(Ordering::Relaxed)
    }

    /// Current values of all non-zero counters
    pub fn snapshot(&self) -> Vec<(Counter, u64)> {
        Counter::ALL
            .into_iter()
            .map(|c| (c, self.get(c)))
            .filter(|&(_, v)| v > 0)
            .collect()
    }
}

impl CounterSink for Counters {
    fn increment(&self, counter: Counter, by: u64) {
        self.values[counter.index()].fetch_add(by, Ordering::Relaxed);
    }
}

/// Discards all increments
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCounters;

impl CounterSink for NoopCounters {
    fn increment(&self, _counter: Counter, _by: u64) {}
}

// =============================================================================
// Progress / Liveness
// =============================================================================

/// Liveness signal towards whatever supervises a long-running task
pub trait ProgressReporter: Send + Sync {
    fn progress(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn progress(&self) {}
}

/// Counts progress signals and logs at most once per interval
#[derive(Debug)]
pub struct LoggingProgress {
    label: String,
    interval: Duration,
    ticks: AtomicU64,
    last_log: Mutex<Instant>,
}

impl LoggingProgress {
    pub fn new(label: impl Into<String>, interval: Duration) -> Self {
        Self {
            label: label.into(),
            interval,
            ticks: AtomicU64::new(0),
            last_log: Mutex::new(Instant::now()),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for LoggingProgress {
    fn progress(&self) {
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let mut last = self.last_log.lock();
        if last.elapsed() >= self.interval {
            *last = Instant::now();
            debug!(task = %self.label, ticks, "progress");
        }
    }
}
