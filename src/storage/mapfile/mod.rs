//! MapFile Module
//!
//! Write-once sorted key-value container with a sparse index.
//!
//! ## Layout
//! A container is a directory holding two files:
//! ```text
//! <container>/
//! ├── data
//! │   ┌──────────────────────────────────────────────────────────┐
//! │   │ Header                                                   │
//! │   │   Magic "WMAP" (4) | Version u16 (2) | MetaLen u32 (4)   │
//! │   │   ContainerMeta (bincode, MetaLen bytes)                 │
//! │   ├──────────────────────────────────────────────────────────┤
//! │   │ Entries                                                  │
//! │   │   [KeyLen u32][ValLen u32][Key][Value]                   │
//! │   │   ... non-decreasing key order ...                       │
//! │   ├──────────────────────────────────────────────────────────┤
//! │   │ Footer (16 bytes)                                        │
//! │   │   EntryCount u64 (8) | DataCRC u32 (4) | Magic "PAMW"    │
//! │   └──────────────────────────────────────────────────────────┘
//! └── index
//!     ┌──────────────────────────────────────────────────────────┐
//!     │ Magic "WIDX" (4) | Version u16 (2) | Interval u32 (4)    │
//!     ├──────────────────────────────────────────────────────────┤
//!     │ [KeyLen u32][Offset u64][Key]  for every Nth entry       │
//!     └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are stored deflate-compressed when the container's
//! [`Compression`] says so; the CRC covers the stored entry bytes.

mod builder;
mod iterator;
mod reader;

use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use builder::{ContainerSummary, MapFileWriter};
pub use iterator::MapFileIterator;
pub use reader::MapFileReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// File holding the sorted entries
pub const DATA_FILE: &str = "data";

/// File holding the sparse index
pub const INDEX_FILE: &str = "index";

pub(crate) const DATA_MAGIC: &[u8; 4] = b"WMAP";
pub(crate) const FOOTER_MAGIC: &[u8; 4] = b"PAMW";
pub(crate) const INDEX_MAGIC: &[u8; 4] = b"WIDX";

/// Current container format version
pub(crate) const VERSION: u16 = 1;

/// Magic (4) + Version (2) + MetaLen (4), followed by the metadata itself
pub(crate) const DATA_PREFIX_SIZE: u64 = 10;

/// Magic (4) + Version (2) + Interval (4)
pub(crate) const INDEX_HEADER_SIZE: usize = 10;

/// EntryCount (8) + DataCRC (4) + Magic (4)
pub(crate) const FOOTER_SIZE: u64 = 16;

/// KeyLen (4) + ValLen (4)
pub(crate) const ENTRY_HEADER_SIZE: u64 = 8;

// =============================================================================
// Container Metadata
// =============================================================================

/// Type of the keys stored in a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// UTF-8 text (UUIDs and URIs)
    Text,
    Bytes,
}

/// Type of the values stored in a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    /// JSON record document
    JsonDocument,
    /// Plain text (UUID back-references)
    Text,
    Bytes,
}

/// Total order over keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    /// Unsigned byte-lexicographic order
    Bytewise,
}

/// Value compression inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    None,
    Deflate,
}

/// Self-description stored in every data file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMeta {
    pub key_kind: KeyKind,
    pub value_kind: ValueKind,
    pub comparator: Comparator,
    pub compression: Compression,
    pub index_interval: u32,
}

impl ContainerMeta {
    /// Metadata for a container of JSON documents keyed by UUID
    pub fn documents(compression: Compression, index_interval: u32) -> Self {
        Self {
            key_kind: KeyKind::Text,
            value_kind: ValueKind::JsonDocument,
            comparator: Comparator::Bytewise,
            compression,
            index_interval,
        }
    }

    /// Metadata for a container of UUID references keyed by URI
    pub fn references(compression: Compression, index_interval: u32) -> Self {
        Self {
            key_kind: KeyKind::Text,
            value_kind: ValueKind::Text,
            comparator: Comparator::Bytewise,
            compression,
            index_interval,
        }
    }

    /// Two containers can be merged when keys, values and order agree.
    /// Compression and index interval are storage details and may differ.
    pub fn is_merge_compatible(&self, other: &ContainerMeta) -> bool {
        self.key_kind == other.key_kind
            && self.value_kind == other.value_kind
            && self.comparator == other.comparator
    }
}

/// Whether `dir` looks like a container (both files present)
pub fn is_container(dir: &Path) -> bool {
    dir.join(DATA_FILE).is_file() && dir.join(INDEX_FILE).is_file()
}

// =============================================================================
// Entry Decoding Helpers
// =============================================================================

/// Read one `[KeyLen][ValLen]` entry header
pub(crate) fn read_entry_header<R: Read>(reader: &mut R) -> io::Result<(usize, usize)> {
    let mut header = [0u8; ENTRY_HEADER_SIZE as usize];
    reader.read_exact(&mut header)?;
    let key_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let val_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    Ok((key_len, val_len))
}

pub(crate) fn read_exact_vec<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn compress_value(compression: Compression, value: &[u8]) -> io::Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(value.to_vec()),
        Compression::Deflate => {
            use std::io::Write;
            let mut encoder =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(value)?;
            encoder.finish()
        }
    }
}

pub(crate) fn decompress_value(compression: Compression, stored: Vec<u8>) -> io::Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(stored),
        Compression::Deflate => {
            let mut decoder = flate2::read::DeflateDecoder::new(stored.as_slice());
            let mut value = Vec::with_capacity(stored.len() * 4);
            decoder.read_to_end(&mut value)?;
            Ok(value)
        }
    }
}
