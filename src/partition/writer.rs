//! Partitioned Writer
//!
//! Routes sorted `(composite key, value)` pairs into one container per
//! `(stream, partition)` below a batch directory.
//!
//! Input must be ordered by partition, then by key. A partition is closed
//! as soon as a higher partition arrives, so at most one container per
//! stream is open at any time.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::config::Config;
use crate::counters::{Counter, CounterSink};
use crate::error::{Result, WarcMapError};
use crate::storage::{Compression, ContainerMeta, ContainerSummary, MapFileWriter};

use super::{partition_for, OutputStream};

/// Writer fanning out one split's output into partition containers
pub struct PartitionedWriter {
    root: PathBuf,
    num_partitions: u32,
    compression: Compression,
    index_interval: u32,
    current_partition: Option<u32>,
    open: BTreeMap<OutputStream, MapFileWriter>,
    finished: Vec<ContainerSummary>,
    counters: Arc<dyn CounterSink>,
}

impl PartitionedWriter {
    /// Create a writer below `root` (created if missing)
    pub fn new(root: &Path, config: &Config, counters: Arc<dyn CounterSink>) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            num_partitions: config.num_partitions,
            compression: config.compression,
            index_interval: config.index_interval,
            current_partition: None,
            open: BTreeMap::new(),
            finished: Vec::new(),
            counters,
        })
    }

    /// Write one pair. The key carries its stream prefix (`data...`,
    /// `uri...`), which is stripped before hashing and storing.
    pub fn write(&mut self, composite_key: &str, value: &[u8]) -> Result<()> {
        let Some((stream, key)) = OutputStream::split_key(composite_key) else {
            error!(key = composite_key, "key doesn't start with a known stream prefix");
            return Ok(());
        };
        let partition = partition_for(key, self.num_partitions);

        match self.current_partition {
            Some(current) if partition < current => {
                return Err(WarcMapError::OrderViolation {
                    output: self.root.display().to_string(),
                    last: format!("partition {}", current),
                    key: format!("{} (partition {})", composite_key, partition),
                });
            }
            Some(current) if partition > current => self.close_open()?,
            _ => {}
        }
        self.current_partition = Some(partition);

        let meta = self.meta_for(stream);
        let writer = match self.open.entry(stream) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let dir = self.root.join(stream.shard_name(partition));
                e.insert(MapFileWriter::create(&dir, meta)?)
            }
        };

        // Reducer semantics: the first value of a key wins
        if writer.last_key() == Some(key.as_bytes()) {
            debug!(key = composite_key, "dropping duplicate key");
            self.counters.increment(Counter::DuplicateKeys, 1);
            return Ok(());
        }

        writer.append(key.as_bytes(), value)?;
        self.counters.increment(
            match stream {
                OutputStream::Data => Counter::DataEntries,
                OutputStream::Uri => Counter::UriEntries,
            },
            1,
        );
        Ok(())
    }

    /// Finish all open containers and return every container written
    pub fn finish(mut self) -> Result<Vec<ContainerSummary>> {
        self.close_open()?;
        Ok(self.finished)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn meta_for(&self, stream: OutputStream) -> ContainerMeta {
        match stream {
            OutputStream::Data => ContainerMeta::documents(self.compression, self.index_interval),
            OutputStream::Uri => ContainerMeta::references(self.compression, self.index_interval),
        }
    }

    fn close_open(&mut self) -> Result<()> {
        for (_, writer) in std::mem::take(&mut self.open) {
            let summary = writer.finish()?;
            debug!(
                path = %summary.path.display(),
                entries = summary.entry_count,
                "closed partition container"
            );
            self.finished.push(summary);
        }
        Ok(())
    }
}
