//! WARC Record Parser
//!
//! Turns a byte stream into records.
//!
//! ## Scanner States
//! ```text
//!   SeekingMarker ──(line starts with version)──▶ ReadingHeader
//!        ▲                                             │
//!        │                     (blank line after Content-Length)
//!        │                                             ▼
//!        └──────────────── record ◀──── read Content-Length bytes
//! ```
//!
//! A blank line alone does not end the header block: some corpora carry
//! broken `WARC-Target-URI` values with embedded blank lines, so the scanner
//! keeps reading until it has seen a `Content-Length`.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use tracing::{debug, warn};

use crate::error::Result;

use super::format::CorpusFormat;
use super::header::{WarcHeader, WarcVersion};
use super::line_reader::LineReader;
use super::record::WarcRecord;

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    SeekingMarker,
    ReadingHeader,
}

/// Parser statistics for one stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Records returned
    pub records: u64,
    /// Records whose body ended before `Content-Length` bytes
    pub truncated: u64,
    /// Header blocks that never produced a usable `Content-Length`
    pub malformed: u64,
}

/// Stateful scanner producing [`WarcRecord`]s from a stream
pub struct WarcRecordParser<R> {
    lines: LineReader<R>,
    version: WarcVersion,
    record_id_field: Option<String>,
    stats: ParseStats,
}

impl<R: BufRead> WarcRecordParser<R> {
    pub fn new(reader: R, version: WarcVersion) -> Self {
        Self {
            lines: LineReader::new(reader),
            version,
            record_id_field: None,
            stats: ParseStats::default(),
        }
    }

    /// Natural-key header applied to every produced record
    pub fn with_record_id_field(mut self, field: impl Into<String>) -> Self {
        self.record_id_field = Some(field.into());
        self
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Uncompressed stream offset after the last consumed byte
    pub fn position(&self) -> u64 {
        self.lines.position()
    }

    /// Read the next record.
    ///
    /// Returns:
    /// - `Ok(Some(record))`: a record (possibly with a truncated body)
    /// - `Ok(None)`: no further record (end of stream, or a header block
    ///   without a usable `Content-Length`)
    /// - `Err(_)`: I/O error on the underlying stream
    pub fn next_record(&mut self) -> io::Result<Option<WarcRecord>> {
        let marker = self.version.marker();
        let mut state = ScanState::SeekingMarker;
        let mut header = WarcHeader::new(self.version);
        let mut content_length: Option<u64> = None;

        loop {
            let line = self.lines.read_line()?;
            match state {
                ScanState::SeekingMarker => match line {
                    None => return Ok(None),
                    Some(line) if line.starts_with(marker) => {
                        state = ScanState::ReadingHeader;
                    }
                    Some(_) => {}
                },
                ScanState::ReadingHeader => {
                    let Some(line) = line else { break };
                    if line.trim().is_empty() {
                        if content_length.is_none() {
                            continue;
                        }
                        break;
                    }

                    let (key, value) = match line.split_once(':') {
                        Some((k, v)) => (k.trim(), v.trim()),
                        None => (line.trim(), ""),
                    };
                    if key.is_empty() {
                        continue;
                    }
                    if key.eq_ignore_ascii_case("content-length") {
                        // Unparseable values reset, like a missing header
                        content_length = value.parse::<u64>().ok();
                    }
                    header.insert(key, value);
                }
            }
        }

        let Some(expected) = content_length else {
            self.stats.malformed += 1;
            warn!(
                position = self.lines.position(),
                "WARC header block without Content-Length, ending split"
            );
            return Ok(None);
        };

        let body = self.lines.read_bytes(expected)?;
        if (body.len() as u64) < expected {
            if body.is_empty() {
                debug!(expected, "stream ended before record body");
                return Ok(None);
            }
            self.stats.truncated += 1;
            warn!(
                expected,
                actual = body.len(),
                "truncated WARC record body"
            );
        }

        let mut record = WarcRecord::new(header, Bytes::from(body));
        if let Some(field) = &self.record_id_field {
            record.set_record_id_field(Some(field));
        }
        self.stats.records += 1;
        Ok(Some(record))
    }
}

// =============================================================================
// WarcReader
// =============================================================================

/// Iterator over the records of one input split.
///
/// Files ending in `.gz` are decompressed as multi-member gzip.
pub struct WarcReader<R> {
    parser: WarcRecordParser<R>,
    done: bool,
}

impl WarcReader<Box<dyn BufRead + Send>> {
    /// Open a WARC file for the given corpus format
    pub fn open(path: &Path, format: CorpusFormat) -> Result<Self> {
        let file = File::open(path)?;
        let is_gzip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

        let reader: Box<dyn BufRead + Send> = if is_gzip {
            Box::new(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                MultiGzDecoder::new(file),
            ))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))
        };

        debug!(path = %path.display(), gzip = is_gzip, %format, "opened WARC input");
        Ok(Self::new(reader, format))
    }
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(reader: R, format: CorpusFormat) -> Self {
        Self {
            parser: WarcRecordParser::new(reader, format.warc_version())
                .with_record_id_field(format.record_id_field()),
            done: false,
        }
    }

    pub fn stats(&self) -> ParseStats {
        self.parser.stats()
    }

    pub fn position(&self) -> u64 {
        self.parser.position()
    }
}

impl<R: BufRead> Iterator for WarcReader<R> {
    type Item = Result<WarcRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parser.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}
