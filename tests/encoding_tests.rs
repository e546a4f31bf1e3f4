//! Tests for payload encoding detection and text rendering

use warcmap::warc::{detect_encoding, ContentEncoding, HeaderMap, PayloadEncoding, PayloadText};

fn headers(content_type: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert("Content-Type", content_type);
    h
}

fn charset(label: &str) -> ContentEncoding {
    ContentEncoding::Charset(label.to_string())
}

// =============================================================================
// Detection Cascade
// =============================================================================

#[test]
fn test_request_is_always_ascii() {
    let payload = [0u8, 1, 2, 3, 4, 5, 6, 7];
    let enc = detect_encoding(Some("request"), &headers("text/html; charset=utf-8"), &payload);
    assert_eq!(enc, charset("US-ASCII"));
}

#[test]
fn test_charset_parameter_is_uppercased() {
    let enc = detect_encoding(
        Some("response"),
        &headers("text/html; charset=iso-8859-15"),
        b"hello",
    );
    assert_eq!(enc, charset("ISO-8859-15"));
}

#[test]
fn test_utf8_payload_is_detected() {
    let text = "Gr\u{fc}\u{df}e aus K\u{f6}ln, caf\u{e9} cr\u{e8}me br\u{fb}l\u{e9}e";
    let enc = detect_encoding(Some("response"), &HeaderMap::new(), text.as_bytes());
    assert_eq!(enc, charset("UTF-8"));

    let rendered = PayloadText::render(text.as_bytes(), &enc);
    assert_eq!(rendered.encoding, PayloadEncoding::Plain);
    assert_eq!(rendered.text, text);
}

#[test]
fn test_utf8_payload_with_stray_control_byte_stays_utf8() {
    let sentence = "<p>Gr\u{fc}\u{df}e aus K\u{f6}ln, na\u{ef}ve caf\u{e9} d\u{e9}j\u{e0} vu \u{2014} \u{e7}a va?</p>";
    let mut payload = sentence.repeat(4).into_bytes();
    payload.insert(10, 0x01);

    let enc = detect_encoding(Some("response"), &HeaderMap::new(), &payload);
    assert_eq!(enc, charset("UTF-8"));

    let rendered = PayloadText::render(&payload, &enc);
    assert_eq!(rendered.encoding, PayloadEncoding::Plain);
    assert!(rendered.text.contains("K\u{f6}ln"));
}

#[test]
fn test_plain_ascii_defaults_to_latin1() {
    let enc = detect_encoding(Some("response"), &HeaderMap::new(), b"<html>plain</html>");
    assert_eq!(enc, charset("ISO-8859-1"));
}

#[test]
fn test_control_bytes_over_threshold_are_binary() {
    let mut payload = vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05];
    payload.extend_from_slice(b"PNG-ish data");
    let enc = detect_encoding(Some("response"), &HeaderMap::new(), &payload);
    assert_eq!(enc, ContentEncoding::Binary);
}

#[test]
fn test_control_bytes_at_threshold_are_text() {
    let mut payload = b"text".to_vec();
    payload.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05]);
    let enc = detect_encoding(Some("response"), &HeaderMap::new(), &payload);
    assert_eq!(enc, charset("ISO-8859-1"));
}

#[test]
fn test_control_bytes_after_sniff_window_are_ignored() {
    let mut payload = vec![b'a'; 512];
    payload.extend_from_slice(&[0u8; 64]);
    let enc = detect_encoding(Some("response"), &HeaderMap::new(), &payload);
    assert!(!enc.is_binary());
}

// =============================================================================
// Rendering
// =============================================================================

#[test]
fn test_binary_payload_round_trips_through_base64() {
    let payload: Vec<u8> = (0u8..=255).cycle().take(2000).collect();
    let enc = detect_encoding(Some("response"), &HeaderMap::new(), &payload);
    assert!(enc.is_binary());

    let rendered = PayloadText::render(&payload, &enc);
    assert_eq!(rendered.encoding, PayloadEncoding::Base64);
    assert_eq!(rendered.decode_base64().unwrap(), payload);
}

#[test]
fn test_unknown_charset_label_falls_back_to_base64() {
    let rendered = PayloadText::render(b"abc", &charset("X-NOT-A-CHARSET"));
    assert_eq!(rendered.encoding, PayloadEncoding::Base64);
    assert_eq!(rendered.decode_base64().unwrap(), b"abc");
}

#[test]
fn test_latin1_rendering() {
    let rendered = PayloadText::render(&[b'c', b'a', b'f', 0xE9], &charset("ISO-8859-1"));
    assert_eq!(rendered.encoding, PayloadEncoding::Plain);
    assert_eq!(rendered.text, "caf\u{e9}");
}

#[test]
fn test_empty_payload_is_plain() {
    let rendered = PayloadText::render(b"", &ContentEncoding::Binary);
    assert_eq!(rendered.encoding, PayloadEncoding::Plain);
    assert!(rendered.text.is_empty());
}

#[test]
fn test_payload_encoding_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&PayloadEncoding::Base64).unwrap(), "\"base64\"");
    assert_eq!(serde_json::to_string(&PayloadEncoding::Plain).unwrap(), "\"plain\"");
}
