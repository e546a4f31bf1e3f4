//! Configuration for warcmap
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{Result, WarcMapError};
use crate::storage::Compression;
use crate::warc::CorpusFormat;

/// Main configuration shared by the generate, merge and browse tools
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Record Identity
    // -------------------------------------------------------------------------
    /// Prefix mixed into every record UUID (usually the corpus name)
    pub uuid_prefix: String,

    /// Corpus flavour: decides WARC version marker and natural-key header
    pub format: CorpusFormat,

    // -------------------------------------------------------------------------
    // Output Layout
    // -------------------------------------------------------------------------
    /// Number of output shards per logical stream ("data", "uri")
    pub num_partitions: u32,

    /// Every Nth key of a container is written to its sparse index
    pub index_interval: u32,

    /// Value compression inside shard containers
    pub compression: Compression,

    // -------------------------------------------------------------------------
    // Record Filtering
    // -------------------------------------------------------------------------
    /// Records with less content than this are skipped
    pub min_record_bytes: usize,

    /// Records with more content than this are skipped
    pub max_record_bytes: usize,

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------
    /// Worker threads for splits (generate) and shard groups (batch merge)
    pub workers: usize,

    /// Poll interval of the merge liveness watcher
    pub liveness_interval: Duration,

    /// Keep per-split staging containers after generation
    pub keep_staging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uuid_prefix: String::new(),
            format: CorpusFormat::CommonCrawl,
            num_partitions: 100,
            index_interval: 128,
            compression: Compression::Deflate,
            min_record_bytes: 0,
            max_record_bytes: 64 * 1024 * 1024, // 64 MB
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            liveness_interval: Duration::from_secs(30),
            keep_staging: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings no tool can run with
    pub fn validate(&self) -> Result<()> {
        if self.num_partitions == 0 {
            return Err(WarcMapError::Config(
                "number of partitions must be at least 1".to_string(),
            ));
        }
        if self.index_interval == 0 {
            return Err(WarcMapError::Config(
                "index interval must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(WarcMapError::Config(
                "at least one worker is required".to_string(),
            ));
        }
        if self.min_record_bytes > self.max_record_bytes {
            return Err(WarcMapError::Config(format!(
                "min record size {} exceeds max record size {}",
                self.min_record_bytes, self.max_record_bytes
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the UUID prefix
    pub fn uuid_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.uuid_prefix = prefix.into();
        self
    }

    /// Set the corpus format
    pub fn format(mut self, format: CorpusFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Set the number of output partitions
    pub fn num_partitions(mut self, count: u32) -> Self {
        self.config.num_partitions = count;
        self
    }

    /// Set the sparse index interval
    pub fn index_interval(mut self, interval: u32) -> Self {
        self.config.index_interval = interval;
        self
    }

    /// Set the value compression
    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    /// Set the minimum record content size (in bytes)
    pub fn min_record_bytes(mut self, size: usize) -> Self {
        self.config.min_record_bytes = size;
        self
    }

    /// Set the maximum record content size (in bytes)
    pub fn max_record_bytes(mut self, size: usize) -> Self {
        self.config.max_record_bytes = size;
        self
    }

    /// Set the number of worker threads
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count;
        self
    }

    /// Set the liveness poll interval
    pub fn liveness_interval(mut self, interval: Duration) -> Self {
        self.config.liveness_interval = interval;
        self
    }

    /// Keep staging output after generation
    pub fn keep_staging(mut self, keep: bool) -> Self {
        self.config.keep_staging = keep;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
