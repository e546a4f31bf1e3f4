//! Storage Module
//!
//! Persistent shard containers and point lookups against a sharded store.
//!
//! ## Responsibilities
//! - Write sorted key-value containers with a sparse index (`mapfile`)
//! - Scan containers sequentially for merging and verification
//! - Route lookups to the single shard that can hold a key (`manager`)
//!
//! ## Store Layout
//! ```text
//! <store>/
//! ├── data-r-00000/   { data, index }   uuid → JSON document
//! ├── data-r-00001/
//! ├── ...
//! ├── uri-r-00000/    { data, index }   uri  → uuid
//! └── ...
//! ```

mod manager;
mod mapfile;

pub use manager::{LookupKey, RecordHit, ShardStore};
pub use mapfile::{
    is_container, Comparator, Compression, ContainerMeta, ContainerSummary, KeyKind,
    MapFileIterator, MapFileReader, MapFileWriter, ValueKind, DATA_FILE, INDEX_FILE,
};
