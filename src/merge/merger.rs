//! K-Way Merger
//!
//! Streams N sorted containers into one.
//!
//! ## Algorithm
//! ```text
//!   heads: [ (k0,v0) | (k1,v1) | ∅ | ... ]     one pending entry per input
//!             │
//!             ├─ pick the smallest key, lowest input index on ties
//!             ├─ append it to the output, report progress
//!             └─ refill only that input's slot
//! ```
//! Duplicates are not collapsed: equal keys from several inputs are all
//! written, in input order.
//!
//! Output goes to a hidden sibling directory (`.name.merging`) that is
//! promoted only after the merge succeeded. Promotion moves the previous
//! output aside (`.name.previous`), renames the new output into place and
//! then deletes the old one; [`recover_output`] finishes a promotion that
//! was interrupted between those steps.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::counters::{Counter, CounterSink, NoopCounters, NoopProgress, ProgressReporter};
use crate::error::{Result, WarcMapError};
use crate::storage::{
    Compression, ContainerMeta, ContainerSummary, MapFileReader, MapFileWriter, DATA_FILE,
};

use super::liveness::LivenessWatcher;

type Entry = (Vec<u8>, Vec<u8>);

/// Outcome of one merge
#[derive(Debug, Clone)]
pub struct MergeStats {
    /// Number of input containers
    pub inputs: usize,
    /// Inputs that held no entries at all
    pub empty_inputs: usize,
    pub entries_written: u64,
    pub output: ContainerSummary,
}

/// Merges containers with identical key/value kinds into one
pub struct MapFileMerger {
    compression: Compression,
    index_interval: u32,
    liveness_interval: Duration,
    progress: Arc<dyn ProgressReporter>,
    counters: Arc<dyn CounterSink>,
}

impl MapFileMerger {
    pub fn new(config: &Config) -> Self {
        Self {
            compression: config.compression,
            index_interval: config.index_interval,
            liveness_interval: config.liveness_interval,
            progress: Arc::new(NoopProgress),
            counters: Arc::new(NoopCounters),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_counters(mut self, counters: Arc<dyn CounterSink>) -> Self {
        self.counters = counters;
        self
    }

    /// Open the given containers and merge them into `output`
    pub fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<MergeStats> {
        recover_output(output)?;
        let readers = inputs
            .iter()
            .map(|path| MapFileReader::open(path))
            .collect::<Result<Vec<_>>>()?;
        self.merge_readers(&readers, output)
    }

    /// Merge already opened containers into `output`.
    ///
    /// `output` may be one of the inputs; it is replaced once all inputs
    /// have been read. Call [`recover_output`] before opening the inputs.
    pub fn merge_readers(&self, readers: &[MapFileReader], output: &Path) -> Result<MergeStats> {
        let Some(first) = readers.first() else {
            return Err(WarcMapError::NoContainersFound(format!(
                "nothing to merge into {}",
                output.display()
            )));
        };
        check_compatible(readers)?;

        let backup = backup_sibling(output);
        if backup.exists() && !output.exists() {
            return Err(WarcMapError::corrupt(
                output,
                format!("interrupted merge left {} unrecovered", backup.display()),
            ));
        }

        self.counters
            .increment(Counter::ContainersToBeMerged, readers.len() as u64);

        let meta = ContainerMeta {
            compression: self.compression,
            index_interval: self.index_interval,
            ..*first.meta()
        };

        let tmp = temp_sibling(output);
        if tmp.exists() {
            warn!(path = %tmp.display(), "removing stale merge output");
            fs::remove_dir_all(&tmp)?;
        }

        info!(
            inputs = readers.len(),
            output = %output.display(),
            "merging containers"
        );

        let stats = match self.merge_into(readers, meta, &tmp) {
            Ok(stats) => stats,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&tmp) {
                    warn!(path = %tmp.display(), error = %cleanup, "could not remove partial merge output");
                }
                return Err(e);
            }
        };

        promote(&tmp, output)?;

        self.counters.increment(Counter::MergesFinished, 1);
        info!(
            output = %output.display(),
            entries = stats.entries_written,
            empty_inputs = stats.empty_inputs,
            "merge finished"
        );

        Ok(MergeStats {
            output: ContainerSummary {
                path: output.to_path_buf(),
                ..stats.output
            },
            ..stats
        })
    }

    fn merge_into(
        &self,
        readers: &[MapFileReader],
        meta: ContainerMeta,
        tmp: &Path,
    ) -> Result<MergeStats> {
        let mut writer = MapFileWriter::create(tmp, meta)?;
        let _watcher = LivenessWatcher::spawn(
            &tmp.join(DATA_FILE),
            self.liveness_interval,
            Arc::clone(&self.progress),
        )?;

        let mut scans = readers
            .iter()
            .map(|r| r.scan())
            .collect::<Result<Vec<_>>>()?;

        // Fill the working array
        let mut heads: Vec<Option<Entry>> = Vec::with_capacity(scans.len());
        let mut empty_inputs = 0;
        for (i, scan) in scans.iter_mut().enumerate() {
            let head = scan.next().transpose()?;
            if head.is_none() {
                debug!(input = %readers[i].path().display(), "empty input container");
                self.counters.increment(Counter::EmptyInputContainers, 1);
                empty_inputs += 1;
            }
            heads.push(head);
        }

        let mut entries_written = 0u64;
        while let Some(i) = select_min(&heads) {
            if let Some((key, value)) = heads[i].take() {
                writer.append(&key, &value)?;
                entries_written += 1;
                self.counters.increment(Counter::EntriesWritten, 1);
                self.progress.progress();
            }

            heads[i] = scans[i].next().transpose()?;
            if heads[i].is_none() {
                debug!(input = %readers[i].path().display(), "input exhausted");
                self.counters.increment(Counter::InputsExhausted, 1);
            }
        }

        let output = writer.finish()?;
        Ok(MergeStats {
            inputs: readers.len(),
            empty_inputs,
            entries_written,
            output,
        })
    }
}

/// Index of the smallest pending key; the first one wins on ties
pub(crate) fn select_min(heads: &[Option<Entry>]) -> Option<usize> {
    let mut min: Option<(usize, &[u8])> = None;
    for (i, head) in heads.iter().enumerate() {
        if let Some((key, _)) = head {
            if min.map_or(true, |(_, current)| key.as_slice() < current) {
                min = Some((i, key.as_slice()));
            }
        }
    }
    min.map(|(i, _)| i)
}

fn check_compatible(readers: &[MapFileReader]) -> Result<()> {
    let Some(first) = readers.first() else {
        return Ok(());
    };
    for reader in &readers[1..] {
        if !first.meta().is_merge_compatible(reader.meta()) {
            return Err(WarcMapError::IncompatibleContainers(format!(
                "{} ({:?}/{:?}/{:?}) vs {} ({:?}/{:?}/{:?})",
                first.path().display(),
                first.meta().key_kind,
                first.meta().value_kind,
                first.meta().comparator,
                reader.path().display(),
                reader.meta().key_kind,
                reader.meta().value_kind,
                reader.meta().comparator,
            )));
        }
    }
    Ok(())
}

/// Finish a promotion interrupted between its renames: a backup without
/// an output is restored, a backup next to an output is deleted.
pub fn recover_output(output: &Path) -> Result<()> {
    let backup = backup_sibling(output);
    if !backup.exists() {
        return Ok(());
    }
    if output.exists() {
        debug!(path = %backup.display(), "removing stale merge backup");
        fs::remove_dir_all(&backup)?;
    } else {
        warn!(
            backup = %backup.display(),
            output = %output.display(),
            "restoring output of an interrupted merge"
        );
        fs::rename(&backup, output)?;
    }
    Ok(())
}

/// Move `tmp` over `output`, keeping the previous output until the new
/// one is in place
fn promote(tmp: &Path, output: &Path) -> Result<()> {
    let backup = backup_sibling(output);
    let replaced = output.exists();
    if replaced {
        if backup.exists() {
            fs::remove_dir_all(&backup)?;
        }
        fs::rename(output, &backup)?;
    }

    if let Err(e) = fs::rename(tmp, output) {
        if replaced {
            if let Err(restore) = fs::rename(&backup, output) {
                warn!(path = %backup.display(), error = %restore, "could not restore previous output");
            }
        }
        return Err(e.into());
    }

    if replaced {
        fs::remove_dir_all(&backup)?;
    }
    Ok(())
}

/// `parent/.name.merging`
fn temp_sibling(output: &Path) -> PathBuf {
    hidden_sibling(output, "merging")
}

/// `parent/.name.previous`
fn backup_sibling(output: &Path) -> PathBuf {
    hidden_sibling(output, "previous")
}

fn hidden_sibling(output: &Path, suffix: &str) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!(".{}.{}", name, suffix))
}
