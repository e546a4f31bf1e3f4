//! Shared helpers for integration tests

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;

/// Build one WARC/1.0 record with the given header fields and content.
/// `Content-Length` is computed from `content`.
pub fn warc_record(fields: &[(&str, &str)], content: &[u8]) -> Vec<u8> {
    warc_record_with_version("WARC/1.0", fields, content)
}

pub fn warc_record_with_version(version: &str, fields: &[(&str, &str)], content: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(version.as_bytes());
    out.extend_from_slice(b"\r\n");
    for (k, v) in fields {
        out.extend_from_slice(format!("{}: {}\r\n", k, v).as_bytes());
    }
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", content.len()).as_bytes());
    out.extend_from_slice(content);
    out.extend_from_slice(b"\r\n\r\n");
    out
}

/// An HTTP response record as found in Common Crawl
pub fn response_record(record_id: &str, uri: &str, http: &[u8]) -> Vec<u8> {
    warc_record(
        &[
            ("WARC-Type", "response"),
            ("WARC-Record-ID", record_id),
            ("WARC-Target-URI", uri),
            ("Content-Type", "application/http; msgtype=response"),
        ],
        http,
    )
}

pub fn request_record(record_id: &str, uri: &str) -> Vec<u8> {
    let http = format!("GET / HTTP/1.1\r\nHost: {}\r\n\r\n", uri);
    warc_record(
        &[
            ("WARC-Type", "request"),
            ("WARC-Record-ID", record_id),
            ("WARC-Target-URI", uri),
            ("Content-Type", "application/http; msgtype=request"),
        ],
        http.as_bytes(),
    )
}

pub fn warcinfo_record() -> Vec<u8> {
    warc_record(
        &[("WARC-Type", "warcinfo"), ("Content-Type", "application/warc-fields")],
        b"software: test\r\n",
    )
}

pub fn html_response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    let mut file = File::create(path).unwrap();
    file.write_all(bytes).unwrap();
}

/// Write each chunk as its own gzip member
pub fn write_gzip_members(path: &Path, members: &[Vec<u8>]) {
    let mut file = File::create(path).unwrap();
    for member in members {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(member).unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
    }
}
