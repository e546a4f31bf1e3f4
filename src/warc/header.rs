//! WARC Header
//!
//! Version tag, content length and the case-insensitive header mapping.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use serde::ser::{Serialize, SerializeMap, Serializer};

const NEWLINE: &str = "\r\n";
const CONTENT_LENGTH: &str = "Content-Length";

/// WARC format versions recognised by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarcVersion {
    /// `WARC/0.18` (ClueWeb09)
    Warc018,
    /// `WARC/1.0`
    Warc10,
}

impl WarcVersion {
    /// The version line that opens every record
    pub fn marker(&self) -> &'static str {
        match self {
            WarcVersion::Warc018 => "WARC/0.18",
            WarcVersion::Warc10 => "WARC/1.0",
        }
    }
}

impl fmt::Display for WarcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

// =============================================================================
// HeaderMap
// =============================================================================

/// Header mapping ordered and looked up case-insensitively.
///
/// The first spelling of a name is kept; inserting the same name with
/// different case replaces only the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    /// lowercased name → (original name, value)
    entries: BTreeMap<String, (String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.entry(name.to_ascii_lowercase()) {
            Entry::Occupied(mut e) => e.get_mut().1 = value,
            Entry::Vacant(e) => {
                e.insert((name, value));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .remove(&name.to_ascii_lowercase())
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs in case-insensitive name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// =============================================================================
// WarcHeader
// =============================================================================

/// Header block of one WARC record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarcHeader {
    version: WarcVersion,
    content_length: u64,
    metadata: HeaderMap,
}

impl WarcHeader {
    pub fn new(version: WarcVersion) -> Self {
        Self {
            version,
            content_length: 0,
            metadata: HeaderMap::new(),
        }
    }

    pub fn version(&self) -> WarcVersion {
        self.version
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Set the content length, keeping the `Content-Length` field in sync
    pub(crate) fn set_content_length(&mut self, length: u64) {
        self.content_length = length;
        self.metadata.insert(CONTENT_LENGTH, length.to_string());
    }

    /// Add a header field. `Content-Length` is managed by the record and
    /// cannot be overridden here.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
            return;
        }
        self.metadata.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.metadata.get(name)
    }

    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// Write the version line and all fields, without the blank terminator
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{}", self)
    }
}

impl fmt::Display for WarcHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.version, NEWLINE)?;
        for (k, v) in self.metadata.iter() {
            write!(f, "{}: {}{}", k, v, NEWLINE)?;
        }
        Ok(())
    }
}
