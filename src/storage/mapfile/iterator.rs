//! MapFile Iterator
//!
//! Sequential iteration over all entries of a container. Owns its own file
//! handle, so several scans (and lookups) can run at once.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Result, WarcMapError};

use super::reader::MapFileReader;
use super::{
    decompress_value, read_entry_header, read_exact_vec, Compression, ENTRY_HEADER_SIZE,
};

const SCAN_BUFFER_SIZE: usize = 64 * 1024;

/// Iterator over container entries in key order
pub struct MapFileIterator {
    path: PathBuf,
    file: BufReader<File>,
    compression: Compression,
    /// Stop reading when we reach this offset (start of footer)
    end_offset: u64,
    current_offset: u64,
    failed: bool,
}

impl MapFileIterator {
    pub(super) fn open(data_path: &Path, reader: &MapFileReader) -> Result<Self> {
        let mut file = BufReader::with_capacity(SCAN_BUFFER_SIZE, File::open(data_path)?);
        file.seek(SeekFrom::Start(reader.data_start))?;
        Ok(Self {
            path: reader.path().to_path_buf(),
            file,
            compression: reader.meta().compression,
            end_offset: reader.data_end,
            current_offset: reader.data_start,
            failed: false,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let (key_len, val_len) = read_entry_header(&mut self.file)?;
        let entry_end = self.current_offset + ENTRY_HEADER_SIZE + key_len as u64 + val_len as u64;
        if entry_end > self.end_offset {
            return Err(WarcMapError::corrupt(
                &self.path,
                format!("entry at offset {} overruns the footer", self.current_offset),
            ));
        }
        let key = read_exact_vec(&mut self.file, key_len)?;
        let stored = read_exact_vec(&mut self.file, val_len)?;
        self.current_offset = entry_end;
        let value = decompress_value(self.compression, stored)?;
        Ok((key, value))
    }
}

impl Iterator for MapFileIterator {
    /// (key, value)
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.current_offset >= self.end_offset {
            return None;
        }

        let entry = self.read_entry();
        if entry.is_err() {
            self.failed = true;
        }
        Some(entry)
    }
}
