//! Payload Encoding Detection
//!
//! Decides how a record payload is rendered as text. Detection order:
//!
//! 1. `request` records are US-ASCII
//! 2. `charset=` parameter of the HTTP `Content-Type` header (uppercased)
//! 3. heuristic detection over the payload bytes (inconclusive for pure
//!    ASCII or when the guess cannot decode the payload)
//! 4. more than 5 control bytes in the first 512 bytes → binary
//! 5. ISO-8859-1, the HTTP/1.1 default
//!
//! Binary payloads, and payloads whose charset label is unknown, are
//! rendered as base64 so no byte is lost.

use base64::{engine::general_purpose::STANDARD, Engine};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

use super::header::HeaderMap;

/// Charset assumed for request records
const REQUEST_CHARSET: &str = "US-ASCII";

/// HTTP/1.1 default charset
const DEFAULT_HTTP_CHARSET: &str = "ISO-8859-1";

/// Leading bytes inspected by the binary heuristic
const BINARY_SNIFF_LEN: usize = 512;

/// More control bytes than this in the sniffed prefix means binary
const BINARY_THRESHOLD: usize = 5;

/// Detected payload encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEncoding {
    /// A charset label such as `UTF-8` or `ISO-8859-1`
    Charset(String),
    /// No text encoding applies
    Binary,
}

impl ContentEncoding {
    pub fn is_binary(&self) -> bool {
        matches!(self, ContentEncoding::Binary)
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            ContentEncoding::Charset(label) => Some(label),
            ContentEncoding::Binary => None,
        }
    }
}

/// How the text of a [`PayloadText`] must be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Plain,
    Base64,
}

/// Payload rendered as text together with its rendering mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadText {
    pub text: String,
    pub encoding: PayloadEncoding,
}

impl PayloadText {
    /// Render `payload` with the given encoding; base64 when binary or
    /// when the charset label is not recognised.
    pub fn render(payload: &[u8], encoding: &ContentEncoding) -> Self {
        if payload.is_empty() {
            return Self {
                text: String::new(),
                encoding: PayloadEncoding::Plain,
            };
        }

        let charset = encoding
            .label()
            .and_then(|label| Encoding::for_label(label.trim_matches('"').as_bytes()));

        match charset {
            Some(charset) => {
                let (text, _had_errors) = charset.decode_without_bom_handling(payload);
                Self {
                    text: text.into_owned(),
                    encoding: PayloadEncoding::Plain,
                }
            }
            None => Self {
                text: STANDARD.encode(payload),
                encoding: PayloadEncoding::Base64,
            },
        }
    }

    /// Recover the original payload bytes of a base64 rendering
    pub fn decode_base64(&self) -> Option<Vec<u8>> {
        match self.encoding {
            PayloadEncoding::Base64 => STANDARD.decode(&self.text).ok(),
            PayloadEncoding::Plain => None,
        }
    }
}

/// Run the detection cascade for one payload
pub fn detect_encoding(
    record_type: Option<&str>,
    http_headers: &HeaderMap,
    payload: &[u8],
) -> ContentEncoding {
    if record_type == Some("request") {
        return ContentEncoding::Charset(REQUEST_CHARSET.to_string());
    }

    if let Some(charset) = http_headers.get("Content-Type").and_then(charset_parameter) {
        return ContentEncoding::Charset(charset);
    }

    if let Some(charset) = sniff_charset(payload) {
        return ContentEncoding::Charset(charset.to_string());
    }

    if looks_binary(payload) {
        return ContentEncoding::Binary;
    }

    ContentEncoding::Charset(DEFAULT_HTTP_CHARSET.to_string())
}

/// Extract the `charset=` parameter of a `Content-Type` value, uppercased
fn charset_parameter(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        param
            .find("charset=")
            .map(|pos| param[pos + "charset=".len()..].trim().to_uppercase())
    })
}

/// Heuristic detection. Inconclusive (`None`) for pure ASCII, when the
/// guessed charset cannot decode the payload cleanly, and for non-UTF-8
/// guesses over payloads carrying C0 control bytes.
fn sniff_charset(payload: &[u8]) -> Option<&'static str> {
    let mut detector = EncodingDetector::new();
    let saw_non_ascii = detector.feed(payload, true);
    if !saw_non_ascii {
        return None;
    }

    let guess = detector.guess(None, true);
    if guess
        .decode_without_bom_handling_and_without_replacement(payload)
        .is_none()
    {
        return None;
    }

    let prefix = &payload[..payload.len().min(BINARY_SNIFF_LEN)];
    if guess != UTF_8 && prefix.iter().any(|&b| is_c0_control(b)) {
        return None;
    }
    Some(guess.name())
}

/// Count non-printable bytes in the first 512 bytes
fn looks_binary(payload: &[u8]) -> bool {
    payload
        .iter()
        .take(BINARY_SNIFF_LEN)
        .filter(|&&b| matches!(b, 0x00..=0x08 | 0x0e..=0x1f | 0x80..=0x9f))
        .count()
        > BINARY_THRESHOLD
}

/// C0 control bytes other than tab, line feeds, form feed and escape
fn is_c0_control(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0e..=0x1a | 0x1c..=0x1f)
}
