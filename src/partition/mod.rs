//! Partitioning
//!
//! Maps keys to shard numbers and names the two logical output streams.
//!
//! ```text
//!   "data" + uuid ──┐                     ┌──▶ data-r-00007/
//!                   ├─ strip prefix ─ hash ┤
//!   "uri"  + uri  ──┘                     └──▶ uri-r-00042/
//! ```
//!
//! The hash is the 32-bit Java `String.hashCode` over UTF-16 code units, so
//! shard numbers match stores built by earlier tooling.

mod writer;

use std::fmt;

pub use writer::PartitionedWriter;

/// Logical output stream of the mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputStream {
    /// UUID → JSON record document
    Data,
    /// URI → UUID of the data record
    Uri,
}

impl OutputStream {
    pub const ALL: [OutputStream; 2] = [OutputStream::Data, OutputStream::Uri];

    /// Key prefix and shard name stem
    pub fn prefix(&self) -> &'static str {
        match self {
            OutputStream::Data => "data",
            OutputStream::Uri => "uri",
        }
    }

    /// Build a composite key `prefix + key`
    pub fn key(&self, key: &str) -> String {
        let prefix = self.prefix();
        let mut composite = String::with_capacity(prefix.len() + key.len());
        composite.push_str(prefix);
        composite.push_str(key);
        composite
    }

    /// Split a composite key into its stream and the bare key
    pub fn split_key(key: &str) -> Option<(OutputStream, &str)> {
        OutputStream::ALL
            .into_iter()
            .find_map(|stream| key.strip_prefix(stream.prefix()).map(|rest| (stream, rest)))
    }

    /// Container name of a shard: `data-r-00007`
    pub fn shard_name(&self, partition: u32) -> String {
        shard_name(self.prefix(), partition)
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `{stem}-r-{partition:05}`
pub fn shard_name(stem: &str, partition: u32) -> String {
    format!("{}-r-{:05}", stem, partition)
}

/// Java `String.hashCode`: `h = 31 * h + c` over UTF-16 code units
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Partition of a bare key, always in `[0, num_partitions)`
pub fn partition_for(key: &str, num_partitions: u32) -> u32 {
    debug_assert!(num_partitions > 0);
    let n = i64::from(num_partitions.max(1));
    let h = i64::from(java_string_hash(key));
    (((h % n) + n) % n) as u32
}

/// Partition of a composite key: a known stream prefix is stripped first
pub fn partition_for_composite(key: &str, num_partitions: u32) -> u32 {
    let bare = OutputStream::split_key(key).map_or(key, |(_, rest)| rest);
    partition_for(bare, num_partitions)
}
