//! WARC Record
//!
//! One parsed record: header block plus content, with the embedded HTTP
//! message split into headers and payload when the record carries one.

use std::sync::OnceLock;
use std::io::{self, Write};

use bytes::Bytes;

use super::encoding::{detect_encoding, ContentEncoding, PayloadText};
use super::header::{HeaderMap, WarcHeader};

/// Header field holding the natural key unless a corpus overrides it
pub const DEFAULT_RECORD_ID_FIELD: &str = "WARC-Record-ID";

/// Pseudo-header under which an HTTP status line is stored
pub const HTTP_STATUS_KEY: &str = "__HTTP_STATUS__";

/// Terminator written after the content of every record
const RECORD_TRAILER: &[u8] = b"\r\n\r\n";

/// Natural key of a record.
///
/// `stable` is false when the key header was missing and a random
/// placeholder was generated; such keys differ between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    pub value: String,
    pub stable: bool,
}

/// A parsed WARC record
#[derive(Debug, Clone)]
pub struct WarcRecord {
    header: WarcHeader,
    /// HTTP message headers including the blank separator line
    /// (only for `application/http; msgtype=response` records)
    http_headers: Option<Bytes>,
    /// Payload; the whole content for non-HTTP records
    body: Bytes,
    record_id_field: String,
    http_header_cache: OnceLock<HeaderMap>,
    encoding_cache: OnceLock<ContentEncoding>,
}

impl WarcRecord {
    /// Create a record from a header and its raw content bytes
    pub fn new(header: WarcHeader, content: impl Into<Bytes>) -> Self {
        let mut record = Self {
            header,
            http_headers: None,
            body: Bytes::new(),
            record_id_field: DEFAULT_RECORD_ID_FIELD.to_string(),
            http_header_cache: OnceLock::new(),
            encoding_cache: OnceLock::new(),
        };
        record.set_content(content);
        record
    }

    /// Replace the content, re-splitting the HTTP message and recomputing
    /// the content length
    pub fn set_content(&mut self, content: impl Into<Bytes>) {
        let content = content.into();

        if self.is_http_response() {
            let (headers, body) = split_http_message(&content);
            self.http_headers = Some(headers);
            self.body = body;
        } else {
            self.http_headers = None;
            self.body = content;
        }

        self.http_header_cache = OnceLock::new();
        self.encoding_cache = OnceLock::new();
        self.update_content_length();
    }

    pub fn header(&self) -> &WarcHeader {
        &self.header
    }

    /// `WARC-Type` value (`response`, `request`, `warcinfo`, ...)
    pub fn record_type(&self) -> Option<&str> {
        self.header.get("WARC-Type")
    }

    pub fn target_uri(&self) -> Option<&str> {
        self.header.get("WARC-Target-URI")
    }

    pub fn content_length(&self) -> u64 {
        self.header.content_length()
    }

    /// Change the header field used as natural key; `None` resets it
    pub fn set_record_id_field(&mut self, field: Option<&str>) {
        self.record_id_field = field.unwrap_or(DEFAULT_RECORD_ID_FIELD).to_string();
    }

    pub fn record_id_field(&self) -> &str {
        &self.record_id_field
    }

    /// The record's natural key, or a random `<urn:uuid:...>` placeholder
    pub fn natural_key(&self) -> NaturalKey {
        match self.header.get(&self.record_id_field) {
            Some(id) => NaturalKey {
                value: id.to_string(),
                stable: true,
            },
            None => NaturalKey {
                value: format!("<urn:uuid:{}>", uuid::Uuid::new_v4()),
                stable: false,
            },
        }
    }

    /// Raw HTTP header bytes, if the record carries an HTTP response
    pub fn http_header_bytes(&self) -> Option<&[u8]> {
        self.http_headers.as_deref()
    }

    /// Raw payload bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// HTTP headers as US-ASCII text (non-ASCII bytes become U+FFFD)
    pub fn content_header_string(&self) -> String {
        self.http_headers
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|&b| if b.is_ascii() { char::from(b) } else { '\u{FFFD}' })
            .collect()
    }

    /// Parsed HTTP headers (case-insensitive); empty for non-HTTP records
    pub fn content_headers(&self) -> &HeaderMap {
        self.http_header_cache
            .get_or_init(|| parse_http_headers(&self.content_header_string()))
    }

    /// Detected payload encoding
    pub fn content_encoding(&self) -> &ContentEncoding {
        self.encoding_cache.get_or_init(|| {
            detect_encoding(self.record_type(), self.content_headers(), &self.body)
        })
    }

    /// Payload as text using the detected encoding
    pub fn content(&self) -> PayloadText {
        PayloadText::render(&self.body, self.content_encoding())
    }

    /// Payload as text using an explicit encoding
    pub fn content_with(&self, encoding: &ContentEncoding) -> PayloadText {
        PayloadText::render(&self.body, encoding)
    }

    /// Serialize in WARC framing. The content length is always taken from
    /// the current content.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.header.write_to(w)?;
        w.write_all(b"\r\n")?;
        if let Some(headers) = &self.http_headers {
            w.write_all(headers)?;
        }
        w.write_all(&self.body)?;
        w.write_all(RECORD_TRAILER)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.content_length() as usize + 512);
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut buf);
        buf
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn update_content_length(&mut self) {
        let header_len = self.http_headers.as_ref().map_or(0, |h| h.len());
        self.header
            .set_content_length((header_len + self.body.len()) as u64);
    }

    /// `Content-Type: application/http; msgtype=response`
    fn is_http_response(&self) -> bool {
        let Some(content_type) = self.header.get("Content-Type") else {
            return false;
        };
        let mut parts = content_type.split(';').map(str::trim);
        parts
            .next()
            .is_some_and(|mime| mime.eq_ignore_ascii_case("application/http"))
            && parts.any(|param| param.eq_ignore_ascii_case("msgtype=response"))
    }
}

/// Split an HTTP message at the first CRLFCRLF or LFLF (CRLFCRLF wins at
/// equal positions). Without a separator the whole message is headers.
fn split_http_message(content: &Bytes) -> (Bytes, Bytes) {
    match find_header_end(content) {
        Some(end) => (content.slice(..end), content.slice(end..)),
        None => (content.clone(), Bytes::new()),
    }
}

/// Offset of the first payload byte after the header separator
fn find_header_end(c: &[u8]) -> Option<usize> {
    (1..c.len()).find_map(|i| {
        if i >= 3 && &c[i - 3..=i] == b"\r\n\r\n" {
            return Some(i + 1);
        }
        if c[i - 1] == b'\n' && c[i] == b'\n' {
            return Some(i + 1);
        }
        None
    })
}

fn parse_http_headers(text: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for line in text.lines() {
        match line.split_once(':') {
            Some((key, value)) => {
                let key = key.trim();
                if !key.is_empty() {
                    headers.insert(key, value.trim());
                }
            }
            None => {
                let key = line.trim();
                if key.starts_with("HTTP/1.") {
                    headers.insert(HTTP_STATUS_KEY, key);
                } else if !key.is_empty() {
                    headers.insert(key, "");
                }
            }
        }
    }
    headers
}
