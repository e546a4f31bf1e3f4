//! Generation Job
//!
//! Builds a sharded store from WARC files on the local machine.
//!
//! ```text
//!   input files ──▶ worker pool ──▶ per split:  WarcReader
//!                                                  │  RecordMapper
//!                                                  │  sort by (partition, key)
//!                                                  ▼
//!                                   staging/split-NNNNN/{data,uri}-r-NNNNN
//!                                                  │
//!                                      batch merge ▼
//!                                   output/{data,uri}-r-NNNNN
//! ```
//!
//! Splits share nothing but the counter sink; each writes its own staging
//! batch, and the batch merge combines them (and any shards already in the
//! output directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam::channel;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::counters::{Counter, CounterSink, NoopCounters, NoopProgress, ProgressReporter};
use crate::error::{Result, WarcMapError};
use crate::mapper::RecordMapper;
use crate::merge::{MergeOrchestrator, MergeStats};
use crate::partition::{partition_for_composite, PartitionedWriter};
use crate::storage::ContainerSummary;
use crate::warc::{ParseStats, WarcReader};

/// Name of the staging directory inside the output directory
pub const STAGING_DIR: &str = "_staging";

/// Outcome of one split
#[derive(Debug, Clone)]
pub struct SplitReport {
    pub input: PathBuf,
    /// Staging batch directory of this split
    pub batch_dir: PathBuf,
    pub parse: ParseStats,
    pub containers: Vec<ContainerSummary>,
}

/// Outcome of a whole generation run
#[derive(Debug, Clone, Default)]
pub struct GenerateReport {
    pub splits: Vec<SplitReport>,
    pub shards: Vec<MergeStats>,
}

impl GenerateReport {
    /// Records parsed across all splits
    pub fn records(&self) -> u64 {
        self.splits.iter().map(|s| s.parse.records).sum()
    }
}

/// Parallel generate-and-merge driver
pub struct GenerateJob {
    config: Config,
    counters: Arc<dyn CounterSink>,
    progress: Arc<dyn ProgressReporter>,
}

impl GenerateJob {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        if config.uuid_prefix.is_empty() {
            return Err(WarcMapError::Config("a UUID prefix is required".to_string()));
        }
        Ok(Self {
            config,
            counters: Arc::new(NoopCounters),
            progress: Arc::new(NoopProgress),
        })
    }

    pub fn with_counters(mut self, counters: Arc<dyn CounterSink>) -> Self {
        self.counters = counters;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generate the store for `input` (file, directory or glob) into
    /// `output`
    pub fn run(&self, input: &str, output: &Path) -> Result<GenerateReport> {
        let inputs = discover_inputs(input)?;
        fs::create_dir_all(output)?;
        let staging = output.join(STAGING_DIR);
        if staging.exists() {
            warn!(path = %staging.display(), "removing stale staging directory");
            fs::remove_dir_all(&staging)?;
        }

        info!(
            inputs = inputs.len(),
            format = %self.config.format,
            prefix = %self.config.uuid_prefix,
            partitions = self.config.num_partitions,
            "starting generation"
        );

        let splits = self.run_splits(&inputs, &staging)?;

        let batches: Vec<PathBuf> = splits
            .iter()
            .filter(|s| !s.containers.is_empty())
            .map(|s| s.batch_dir.clone())
            .collect();

        let shards = if batches.is_empty() {
            warn!("no records were written");
            Vec::new()
        } else {
            MergeOrchestrator::new(&self.config)
                .with_counters(Arc::clone(&self.counters))
                .with_progress(Arc::clone(&self.progress))
                .merge_batch_dirs(&batches, output)?
        };

        if self.config.keep_staging {
            debug!(path = %staging.display(), "keeping staging directory");
        } else if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        let report = GenerateReport { splits, shards };
        info!(
            records = report.records(),
            shards = report.shards.len(),
            "generation finished"
        );
        Ok(report)
    }

    /// Process one input file into its own staging batch
    pub fn process_split(&self, index: usize, input: &Path, staging: &Path) -> Result<SplitReport> {
        let mapper = RecordMapper::new(&self.config, Arc::clone(&self.counters));
        let mut reader = WarcReader::open(input, self.config.format)?;

        // (partition, composite key, value)
        let mut pairs: Vec<(u32, String, String)> = Vec::new();
        for record in &mut reader {
            let record = record?;
            if let Some(mapped) = mapper.map(&record)? {
                for (key, value) in mapped.into_pairs() {
                    let partition = partition_for_composite(&key, self.config.num_partitions);
                    pairs.push((partition, key, value));
                }
            }
            self.progress.progress();
        }

        let parse = reader.stats();
        self.counters.increment(Counter::TruncatedRecords, parse.truncated);
        self.counters.increment(Counter::MalformedRecords, parse.malformed);

        // Shuffle: stable, so duplicate keys keep their input order
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let dir = staging.join(split_name(index));
        let mut writer = PartitionedWriter::new(&dir, &self.config, Arc::clone(&self.counters))?;
        for (_, key, value) in &pairs {
            writer.write(key, value.as_bytes())?;
        }
        let containers = writer.finish()?;

        debug!(
            input = %input.display(),
            records = parse.records,
            containers = containers.len(),
            "split finished"
        );

        Ok(SplitReport {
            input: input.to_path_buf(),
            batch_dir: dir,
            parse,
            containers,
        })
    }

    fn run_splits(&self, inputs: &[PathBuf], staging: &Path) -> Result<Vec<SplitReport>> {
        let workers = self.config.workers.min(inputs.len()).max(1);
        let (job_tx, job_rx) = channel::unbounded::<(usize, PathBuf)>();
        let (result_tx, result_rx) = channel::unbounded();
        for job in inputs.iter().cloned().enumerate() {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        crossbeam::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| {
                    for (index, input) in job_rx.iter() {
                        let result = self.process_split(index, &input, staging);
                        if let Err(e) = &result {
                            warn!(input = %input.display(), error = %e, "split failed");
                        }
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        })
        .map_err(|_| WarcMapError::Config("split worker panicked".to_string()))?;
        drop(result_tx);

        let mut results: Vec<(usize, Result<SplitReport>)> = result_rx.iter().collect();
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

/// Expand an input argument into files: a file, a directory (recursive) or a
/// glob pattern
pub fn discover_inputs(input: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(input);
    let mut files = if path.is_file() {
        vec![path.to_path_buf()]
    } else if path.is_dir() {
        let mut files = Vec::new();
        walk_dir(path, &mut files)?;
        files
    } else {
        glob::glob(input)?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect()
    };
    files.sort();

    if files.is_empty() {
        return Err(WarcMapError::Config(format!("no input files match {}", input)));
    }
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            walk_dir(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn split_name(index: usize) -> String {
    format!("split-{:05}", index)
}
