//! Corpus Formats
//!
//! The supported corpora differ only in their WARC version marker and in
//! which header carries the record's natural key.

use std::fmt;
use std::str::FromStr;

use crate::error::WarcMapError;

use super::header::WarcVersion;
use super::record::DEFAULT_RECORD_ID_FIELD;

/// Web corpus flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorpusFormat {
    ClueWeb09,
    ClueWeb12,
    CommonCrawl,
}

impl CorpusFormat {
    pub const ALL: [CorpusFormat; 3] = [
        CorpusFormat::ClueWeb09,
        CorpusFormat::ClueWeb12,
        CorpusFormat::CommonCrawl,
    ];

    pub fn warc_version(&self) -> WarcVersion {
        match self {
            CorpusFormat::ClueWeb09 => WarcVersion::Warc018,
            CorpusFormat::ClueWeb12 | CorpusFormat::CommonCrawl => WarcVersion::Warc10,
        }
    }

    /// Header field used as natural key for UUID generation
    pub fn record_id_field(&self) -> &'static str {
        match self {
            CorpusFormat::ClueWeb09 | CorpusFormat::ClueWeb12 => "WARC-TREC-ID",
            CorpusFormat::CommonCrawl => DEFAULT_RECORD_ID_FIELD,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CorpusFormat::ClueWeb09 => "clueweb09",
            CorpusFormat::ClueWeb12 => "clueweb12",
            CorpusFormat::CommonCrawl => "commoncrawl",
        }
    }
}

impl fmt::Display for CorpusFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CorpusFormat {
    type Err = WarcMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CorpusFormat::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| WarcMapError::UnsupportedFormat(s.to_string()))
    }
}
