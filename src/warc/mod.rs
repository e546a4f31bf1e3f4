//! WARC Module
//!
//! Byte-level parsing of WARC (Web ARChive) containers.
//!
//! ## Responsibilities
//! - Scan a raw or gzip-decompressed stream for version markers
//! - Read header blocks and exactly `Content-Length` body bytes
//! - Split embedded HTTP responses into message headers and payload
//! - Detect the payload character encoding (or classify it as binary)
//!
//! ## Record Framing
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ WARC/1.0\r\n              (version line) │
//! │ WARC-Type: response\r\n                  │
//! │ Content-Length: N\r\n     (header block) │
//! │ \r\n                      (terminator)   │
//! ├──────────────────────────────────────────┤
//! │ N content bytes                          │
//! │ ┌──────────────────┬───────────────────┐ │
//! │ │ HTTP headers     │ payload           │ │
//! │ │ (response only)  │                   │ │
//! │ └──────────────────┴───────────────────┘ │
//! ├──────────────────────────────────────────┤
//! │ \r\n\r\n                  (trailer)      │
//! └──────────────────────────────────────────┘
//! ```

mod encoding;
mod format;
mod header;
mod line_reader;
mod parser;
mod record;

pub use encoding::{detect_encoding, ContentEncoding, PayloadEncoding, PayloadText};
pub use format::CorpusFormat;
pub use header::{HeaderMap, WarcHeader, WarcVersion};
pub use line_reader::LineReader;
pub use parser::{ParseStats, WarcReader, WarcRecordParser};
pub use record::{NaturalKey, WarcRecord, DEFAULT_RECORD_ID_FIELD, HTTP_STATUS_KEY};
