//! WARC Line Reader
//!
//! Byte-exact line decoding over a buffered stream. Lines and record bodies
//! are read through the same `BufRead`, so no bytes past the current
//! position are ever lost to a second buffering layer.

use std::io::{self, BufRead, Read};

/// Reads text lines and raw byte runs from a WARC stream.
///
/// Line decoding is permissive: well-formed multi-byte UTF-8 sequences are
/// reassembled into one character, anything else is passed through byte by
/// byte as Latin-1 characters. Decoding never fails on malformed input.
pub struct LineReader<R> {
    inner: R,
    /// Bytes consumed so far (uncompressed stream offset)
    position: u64,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Number of bytes consumed from the underlying stream
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read the next line without its `\n` terminator.
    ///
    /// Returns:
    /// - `Ok(Some(line))`: a line (empty for a blank line; a trailing `\r`
    ///   is kept and left to the caller's trimming)
    /// - `Ok(None)`: the stream ended before any byte of a new line
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut byte = match self.next_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };

        let mut line = String::new();
        loop {
            if byte == b'\n' {
                return Ok(Some(line));
            }
            self.decode_into(byte, &mut line)?;

            byte = match self.next_byte()? {
                Some(b) => b,
                // Final line without terminator
                None => return Ok(Some(line)),
            };
        }
    }

    /// Read up to `len` raw bytes, retrying short reads until the count is
    /// satisfied or the stream ends. A shorter result means EOF was hit.
    pub fn read_bytes(&mut self, len: u64) -> io::Result<Vec<u8>> {
        // Cap the up-front allocation; a bogus Content-Length must not OOM us
        let mut buf = Vec::with_capacity(len.min(1 << 20) as usize);
        let read = (&mut self.inner).take(len).read_to_end(&mut buf)?;
        self.position += read as u64;
        Ok(buf)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Append the character starting with `lead`, consuming continuation
    /// bytes only when they carry the `10xxxxxx` pattern.
    fn decode_into(&mut self, lead: u8, line: &mut String) -> io::Result<()> {
        let continuation = match lead {
            b if b & 0xF8 == 0xF0 => 3,
            b if b & 0xF0 == 0xE0 => 2,
            b if b & 0xE0 == 0xC0 => 1,
            b => {
                line.push(char::from(b));
                return Ok(());
            }
        };

        let mut seq = [lead, 0, 0, 0];
        let mut len = 1;
        while len <= continuation {
            match self.peek_byte()? {
                Some(b) if b & 0xC0 == 0x80 => {
                    self.next_byte()?;
                    seq[len] = b;
                    len += 1;
                }
                // Malformed or truncated: leave the byte for the next round
                _ => break,
            }
        }

        if len == continuation + 1 {
            if let Ok(s) = std::str::from_utf8(&seq[..len]) {
                line.push_str(s);
                return Ok(());
            }
        }

        // Overlong, surrogate or incomplete sequence: keep the raw bytes
        line.extend(seq[..len].iter().map(|&b| char::from(b)));
        Ok(())
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.peek_byte()?;
        if byte.is_some() {
            self.inner.consume(1);
            self.position += 1;
        }
        Ok(byte)
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
