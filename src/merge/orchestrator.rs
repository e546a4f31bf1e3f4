//! Merge Orchestrator
//!
//! Finds candidate containers, drops the unusable ones and runs one
//! [`MapFileMerger`] per logical shard name.
//!
//! ```text
//!   batch-0/data-r-00000 ─┐
//!   batch-1/data-r-00000 ─┼─▶ out/data-r-00000     (existing out/… is input 0)
//!   batch-2/data-r-00000 ─┘
//!   batch-0/uri-r-00003  ─┬─▶ out/uri-r-00003
//!   batch-2/uri-r-00003  ─┘
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam::channel;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::counters::{CounterSink, ProgressReporter};
use crate::error::{Result, WarcMapError};
use crate::partition::OutputStream;
use crate::storage::{is_container, MapFileReader};

use super::merger::{recover_output, MapFileMerger, MergeStats};

/// Drives single-pass and batch merges
pub struct MergeOrchestrator {
    merger: MapFileMerger,
    workers: usize,
}

impl MergeOrchestrator {
    pub fn new(config: &Config) -> Self {
        Self {
            merger: MapFileMerger::new(config),
            workers: config.workers.max(1),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.merger = self.merger.with_progress(progress);
        self
    }

    pub fn with_counters(mut self, counters: Arc<dyn CounterSink>) -> Self {
        self.merger = self.merger.with_counters(counters);
        self
    }

    pub fn merger(&self) -> &MapFileMerger {
        &self.merger
    }

    /// Single-pass mode: merge every container matching `pattern` into
    /// `output`. An existing `output` takes part as the first input.
    pub fn merge_containers(&self, pattern: &str, output: &Path) -> Result<MergeStats> {
        let candidates: Vec<PathBuf> = expand_pattern(pattern)?
            .into_iter()
            .filter(|path| {
                let usable = is_container(path);
                if !usable {
                    debug!(path = %path.display(), "not a container, skipping");
                }
                usable
            })
            .collect();
        if candidates.is_empty() {
            return Err(WarcMapError::NoContainersFound(format!(
                "no container matches {}",
                pattern
            )));
        }

        self.merge_group(output, candidates)?.ok_or_else(|| {
            WarcMapError::NoContainersFound(format!("no usable container matches {}", pattern))
        })
    }

    /// Batch mode: `pattern` matches batch directories whose `data*` and
    /// `uri*` containers are merged by name into `output_dir`
    pub fn merge_batches(&self, pattern: &str, output_dir: &Path) -> Result<Vec<MergeStats>> {
        let batches: Vec<PathBuf> = expand_pattern(pattern)?
            .into_iter()
            .filter(|path| path.is_dir())
            .collect();
        self.merge_batch_dirs(&batches, output_dir)
    }

    /// Batch mode over explicit batch directories
    pub fn merge_batch_dirs(
        &self,
        batches: &[PathBuf],
        output_dir: &Path,
    ) -> Result<Vec<MergeStats>> {
        let groups = group_shards(batches)?;
        if groups.is_empty() {
            return Err(WarcMapError::NoContainersFound(format!(
                "no shard containers in {} batch directories",
                batches.len()
            )));
        }
        fs::create_dir_all(output_dir)?;

        info!(
            batches = batches.len(),
            shards = groups.len(),
            output = %output_dir.display(),
            "starting batch merge"
        );

        let workers = self.workers.min(groups.len());
        let (job_tx, job_rx) = channel::unbounded::<(String, Vec<PathBuf>)>();
        let (result_tx, result_rx) = channel::unbounded();
        for group in groups {
            // Receiver is alive until the scope below ends
            let _ = job_tx.send(group);
        }
        drop(job_tx);

        crossbeam::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| {
                    for (name, inputs) in job_rx.iter() {
                        let output = output_dir.join(&name);
                        let result = self.merge_group(&output, inputs);
                        if result_tx.send((name, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        })
        .map_err(|_| WarcMapError::Config("merge worker panicked".to_string()))?;
        drop(result_tx);

        let mut results: Vec<(String, Result<Option<MergeStats>>)> = result_rx.iter().collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let mut stats = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (name, result) in results {
            match result {
                Ok(Some(s)) => stats.push(s),
                Ok(None) => warn!(shard = %name, "no usable input containers"),
                Err(e) => {
                    error!(shard = %name, error = %e, "shard merge failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        if stats.is_empty() {
            return Err(WarcMapError::NoContainersFound(
                "every candidate container was unusable".to_string(),
            ));
        }
        Ok(stats)
    }

    /// Merge one shard group; `Ok(None)` when no candidate is usable.
    ///
    /// Unusable candidates are skipped, but an existing `output` that
    /// cannot be opened fails the group and is left untouched.
    fn merge_group(&self, output: &Path, candidates: Vec<PathBuf>) -> Result<Option<MergeStats>> {
        recover_output(output)?;

        let mut seen = BTreeSet::new();
        let mut readers = Vec::with_capacity(candidates.len() + 1);
        if output.exists() {
            let reader = MapFileReader::open(output).map_err(|e| {
                error!(path = %output.display(), error = %e, "existing output is unreadable");
                e
            })?;
            seen.insert(fs::canonicalize(output)?);
            readers.push(reader);
        }

        for path in candidates {
            let identity = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if !seen.insert(identity) {
                continue;
            }
            match MapFileReader::open(&path) {
                Ok(reader) => readers.push(reader),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unusable container"),
            }
        }

        if readers.is_empty() {
            return Ok(None);
        }
        self.merger.merge_readers(&readers, output).map(Some)
    }
}

/// Glob matches in sorted order; an invalid pattern is an error
fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!(error = %e, "unreadable path while expanding pattern"),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Shard containers of all batches grouped by name, paths deduplicated
fn group_shards(batches: &[PathBuf]) -> Result<BTreeMap<String, Vec<PathBuf>>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for batch in batches {
        let mut children: Vec<PathBuf> = fs::read_dir(batch)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        children.sort();

        for child in children {
            let Some(name) = child.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let is_shard = OutputStream::ALL
                .iter()
                .any(|stream| name.starts_with(stream.prefix()));
            if !is_shard || !is_container(&child) {
                continue;
            }
            let group = groups.entry(name.to_string()).or_default();
            if !group.contains(&child) {
                group.push(child);
            }
        }
    }
    Ok(groups)
}
