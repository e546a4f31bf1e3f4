//! MapFile Writer
//!
//! Appends sorted key-value entries to a new container.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, WarcMapError};

use super::{
    compress_value, ContainerMeta, DATA_FILE, DATA_MAGIC, DATA_PREFIX_SIZE, ENTRY_HEADER_SIZE,
    FOOTER_MAGIC, INDEX_FILE, INDEX_MAGIC, VERSION,
};

/// What a finished container looks like
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Container directory
    pub path: PathBuf,
    pub entry_count: u64,
    /// Size of the data file in bytes
    pub data_size: u64,
    pub first_key: Option<Vec<u8>>,
    pub last_key: Option<Vec<u8>>,
}

/// Writer for a new container.
///
/// Keys must arrive in non-decreasing order; equal keys are allowed (merge
/// output keeps duplicates), a decreasing key is an `OrderViolation`.
pub struct MapFileWriter {
    /// Container directory
    path: PathBuf,
    meta: ContainerMeta,
    data: BufWriter<File>,
    index: BufWriter<File>,
    entry_count: u64,
    /// Offset of the next entry in the data file
    current_offset: u64,
    first_key: Option<Vec<u8>>,
    last_key: Option<Vec<u8>>,
    /// Running CRC over all stored entry bytes
    data_hasher: crc32fast::Hasher,
}

impl MapFileWriter {
    /// Create the container directory and write both file headers.
    ///
    /// Existing `data`/`index` files in `dir` are truncated.
    pub fn create(dir: &Path, meta: ContainerMeta) -> Result<Self> {
        if meta.index_interval == 0 {
            return Err(WarcMapError::Config(
                "index interval must be at least 1".to_string(),
            ));
        }
        fs::create_dir_all(dir)?;

        let mut data = BufWriter::new(create_truncated(&dir.join(DATA_FILE))?);
        let mut index = BufWriter::new(create_truncated(&dir.join(INDEX_FILE))?);

        let meta_bytes = bincode::serialize(&meta)?;
        data.write_all(DATA_MAGIC)?;
        data.write_all(&VERSION.to_le_bytes())?;
        data.write_all(&(meta_bytes.len() as u32).to_le_bytes())?;
        data.write_all(&meta_bytes)?;

        index.write_all(INDEX_MAGIC)?;
        index.write_all(&VERSION.to_le_bytes())?;
        index.write_all(&meta.index_interval.to_le_bytes())?;

        debug!(path = %dir.display(), ?meta, "created container");

        Ok(Self {
            path: dir.to_path_buf(),
            meta,
            data,
            index,
            entry_count: 0,
            current_offset: DATA_PREFIX_SIZE + meta_bytes.len() as u64,
            first_key: None,
            last_key: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append an entry (keys in non-decreasing order)
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if let Some(last) = &self.last_key {
            if key < last.as_slice() {
                return Err(WarcMapError::OrderViolation {
                    output: self.path.display().to_string(),
                    last: String::from_utf8_lossy(last).into_owned(),
                    key: String::from_utf8_lossy(key).into_owned(),
                });
            }
        }

        // Nothing is written until the entry is known to fit
        let stored = compress_value(self.meta.compression, value)?;
        let (key_len, val_len) = entry_lengths(key.len(), stored.len())?;
        let key_len_bytes = key_len.to_le_bytes();
        let val_len_bytes = val_len.to_le_bytes();

        // Sample every Nth entry into the sparse index
        if self.entry_count % u64::from(self.meta.index_interval) == 0 {
            self.index.write_all(&key_len_bytes)?;
            self.index.write_all(&self.current_offset.to_le_bytes())?;
            self.index.write_all(key)?;
        }

        self.data.write_all(&key_len_bytes)?;
        self.data.write_all(&val_len_bytes)?;
        self.data.write_all(key)?;
        self.data.write_all(&stored)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);
        self.data_hasher.update(&stored);

        self.current_offset += ENTRY_HEADER_SIZE + key.len() as u64 + stored.len() as u64;
        self.entry_count += 1;

        if self.first_key.is_none() {
            self.first_key = Some(key.to_vec());
        }
        match &mut self.last_key {
            Some(last) => {
                last.clear();
                last.extend_from_slice(key);
            }
            None => self.last_key = Some(key.to_vec()),
        }

        Ok(())
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn last_key(&self) -> Option<&[u8]> {
        self.last_key.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &ContainerMeta {
        &self.meta
    }

    /// Write the footer, flush and sync both files
    pub fn finish(self) -> Result<ContainerSummary> {
        let Self {
            path,
            mut data,
            mut index,
            entry_count,
            current_offset,
            first_key,
            last_key,
            data_hasher,
            ..
        } = self;

        let data_crc = data_hasher.finalize();
        data.write_all(&entry_count.to_le_bytes())?;
        data.write_all(&data_crc.to_le_bytes())?;
        data.write_all(FOOTER_MAGIC)?;

        let data = data.into_inner().map_err(|e| e.into_error())?;
        data.sync_all()?;
        let index = {
            index.flush()?;
            index.into_inner().map_err(|e| e.into_error())?
        };
        index.sync_all()?;

        Ok(ContainerSummary {
            path,
            entry_count,
            data_size: current_offset + super::FOOTER_SIZE,
            first_key,
            last_key,
        })
    }
}

/// On-disk `u32` lengths of an entry
fn entry_lengths(key_len: usize, stored_len: usize) -> Result<(u32, u32)> {
    let key_len = u32::try_from(key_len)
        .map_err(|_| WarcMapError::Serialization("key exceeds 4 GiB".to_string()))?;
    let val_len = u32::try_from(stored_len)
        .map_err(|_| WarcMapError::Serialization("value exceeds 4 GiB".to_string()))?;
    Ok((key_len, val_len))
}

fn create_truncated(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_lengths_in_range() {
        assert_eq!(entry_lengths(3, 70_000).unwrap(), (3, 70_000));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_entry_lengths_reject_oversize() {
        let too_big = u32::MAX as usize + 1;
        assert!(matches!(
            entry_lengths(too_big, 1),
            Err(WarcMapError::Serialization(_))
        ));
        assert!(matches!(
            entry_lengths(1, too_big),
            Err(WarcMapError::Serialization(_))
        ));
    }
}
