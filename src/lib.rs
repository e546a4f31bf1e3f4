//! # warcmap
//!
//! Turns web-crawl corpora in WARC format into a sharded, indexed
//! key-value store:
//! - Byte-exact WARC parsing with tolerant multi-byte line decoding
//! - Deterministic name-based record UUIDs
//! - Partitioned, sorted containers with a sparse index
//! - Streaming k-way merge of batch outputs with liveness reporting
//! - Point lookups by UUID, natural key or URI
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 WARC files (plain or .gz)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  LineReader / WarcRecordParser
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     RecordMapper                            │
//! │         (filter, UUID, JSON document, URI reference)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  sort by (partition, key)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  PartitionedWriter                          │
//! │           one batch of {data,uri}-r-NNNNN per split         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!               ┌───────────────┐          ┌───────────────┐
//!               │ MapFileMerger │ ───────▶ │  ShardStore   │
//!               │   (k-way)     │          │   (lookup)    │
//!               └───────────────┘          └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod counters;

pub mod warc;
pub mod identity;
pub mod mapper;
pub mod partition;
pub mod storage;
pub mod merge;
pub mod generate;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, WarcMapError};
pub use config::Config;
pub use counters::{Counter, CounterSink, Counters, ProgressReporter};
pub use generate::GenerateJob;
pub use identity::generate_id;
pub use merge::{MapFileMerger, MergeOrchestrator};
pub use storage::{LookupKey, ShardStore};
pub use warc::{CorpusFormat, WarcReader, WarcRecord};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of warcmap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
