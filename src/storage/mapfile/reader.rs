//! MapFile Reader
//!
//! Opens containers and serves point lookups through the sparse index:
//! binary search for the last sample below the key, then a short forward
//! scan over the data file.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, WarcMapError};

use super::iterator::MapFileIterator;
use super::{
    decompress_value, read_entry_header, read_exact_vec, ContainerMeta, DATA_FILE, DATA_MAGIC,
    DATA_PREFIX_SIZE, ENTRY_HEADER_SIZE, FOOTER_MAGIC, FOOTER_SIZE, INDEX_FILE,
    INDEX_HEADER_SIZE, INDEX_MAGIC, VERSION,
};

/// Upper bound on the serialized metadata; anything larger is corruption
const MAX_META_LEN: u32 = 4096;

/// Reader for one container with its sparse index held in memory
pub struct MapFileReader {
    path: PathBuf,
    meta: ContainerMeta,
    /// Data file handle shared by lookups
    file: Mutex<BufReader<File>>,
    /// Sampled keys with the data-file offset of their entry, ascending
    index: Vec<(Vec<u8>, u64)>,
    entry_count: u64,
    data_crc: u32,
    /// First entry byte
    pub(super) data_start: u64,
    /// First footer byte
    pub(super) data_end: u64,
}

impl MapFileReader {
    /// Open a container, validating both headers and the footer
    pub fn open(dir: &Path) -> Result<Self> {
        let data_path = dir.join(DATA_FILE);
        let mut file = File::open(&data_path)?;
        let file_size = file.metadata()?.len();

        if file_size < DATA_PREFIX_SIZE + FOOTER_SIZE {
            return Err(WarcMapError::corrupt(dir, "data file too short"));
        }

        // Header
        let mut prefix = [0u8; DATA_PREFIX_SIZE as usize];
        file.read_exact(&mut prefix)?;
        if &prefix[0..4] != DATA_MAGIC {
            return Err(WarcMapError::corrupt(
                dir,
                format!("invalid data magic {:?}", &prefix[0..4]),
            ));
        }
        let version = u16::from_le_bytes([prefix[4], prefix[5]]);
        if version != VERSION {
            return Err(WarcMapError::corrupt(
                dir,
                format!("unsupported format version {}", version),
            ));
        }
        let meta_len = u32::from_le_bytes([prefix[6], prefix[7], prefix[8], prefix[9]]);
        if meta_len > MAX_META_LEN {
            return Err(WarcMapError::corrupt(dir, "metadata length out of range"));
        }
        let meta_bytes = read_exact_vec(&mut file, meta_len as usize)?;
        let meta: ContainerMeta = bincode::deserialize(&meta_bytes)
            .map_err(|e| WarcMapError::corrupt(dir, format!("bad metadata: {}", e)))?;

        let data_start = DATA_PREFIX_SIZE + u64::from(meta_len);
        let data_end = file_size - FOOTER_SIZE;
        if data_end < data_start {
            return Err(WarcMapError::corrupt(dir, "missing footer"));
        }

        // Footer
        file.seek(SeekFrom::Start(data_end))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        if &footer[12..16] != FOOTER_MAGIC {
            return Err(WarcMapError::corrupt(dir, "missing footer (unfinished container?)"));
        }
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&footer[0..8]);
        let entry_count = u64::from_le_bytes(count_bytes);
        let data_crc = u32::from_le_bytes([footer[8], footer[9], footer[10], footer[11]]);

        let index = load_index(dir, data_start, data_end)?;

        file.seek(SeekFrom::Start(data_start))?;

        Ok(Self {
            path: dir.to_path_buf(),
            meta,
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            data_crc,
            data_start,
            data_end,
        })
    }

    /// Look up the first value stored under `key`.
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found
    /// - `Ok(None)`: key not in this container
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.entry_count == 0 {
            return Ok(None);
        }

        // Last sample strictly below the key; equal keys may start before
        // an equal sample, so never start at one
        let idx = self.index.partition_point(|(k, _)| k.as_slice() < key);
        let start = match idx {
            0 => self.data_start,
            i => self.index[i - 1].1,
        };

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(start))?;
        let mut pos = start;

        while pos < self.data_end {
            let (key_len, val_len) = read_entry_header(&mut *file)?;
            let entry_key = read_exact_vec(&mut *file, key_len)?;
            pos += ENTRY_HEADER_SIZE + key_len as u64 + val_len as u64;

            match entry_key.as_slice().cmp(key) {
                Ordering::Less => file.seek_relative(val_len as i64)?,
                Ordering::Equal => {
                    let stored = read_exact_vec(&mut *file, val_len)?;
                    return Ok(Some(decompress_value(self.meta.compression, stored)?));
                }
                Ordering::Greater => return Ok(None),
            }
        }

        Ok(None)
    }

    /// Sequential iterator over all entries with decompressed values
    pub fn scan(&self) -> Result<MapFileIterator> {
        MapFileIterator::open(&self.path.join(DATA_FILE), self)
    }

    /// Re-read the whole data section and check entry count and CRC
    pub fn verify(&self) -> Result<()> {
        let mut file = BufReader::new(File::open(self.path.join(DATA_FILE))?);
        file.seek(SeekFrom::Start(self.data_start))?;

        let mut hasher = crc32fast::Hasher::new();
        let mut count = 0u64;
        let mut pos = self.data_start;

        while pos < self.data_end {
            let (key_len, val_len) = read_entry_header(&mut file)?;
            let body = read_exact_vec(&mut file, key_len + val_len)?;
            hasher.update(&(key_len as u32).to_le_bytes());
            hasher.update(&(val_len as u32).to_le_bytes());
            hasher.update(&body);
            pos += ENTRY_HEADER_SIZE + body.len() as u64;
            count += 1;
        }

        if pos != self.data_end {
            return Err(WarcMapError::corrupt(&self.path, "entry overruns footer"));
        }
        if count != self.entry_count {
            return Err(WarcMapError::corrupt(
                &self.path,
                format!("footer says {} entries, found {}", self.entry_count, count),
            ));
        }
        let crc = hasher.finalize();
        if crc != self.data_crc {
            return Err(WarcMapError::corrupt(
                &self.path,
                format!("CRC mismatch: stored {:08x}, computed {:08x}", self.data_crc, crc),
            ));
        }
        Ok(())
    }

    pub fn meta(&self) -> &ContainerMeta {
        &self.meta
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Size of the data file in bytes
    pub fn data_size(&self) -> u64 {
        self.data_end + FOOTER_SIZE
    }
}

/// Load and validate the sparse index
fn load_index(dir: &Path, data_start: u64, data_end: u64) -> Result<Vec<(Vec<u8>, u64)>> {
    let bytes = fs::read(dir.join(INDEX_FILE))?;
    if bytes.len() < INDEX_HEADER_SIZE || &bytes[0..4] != INDEX_MAGIC {
        return Err(WarcMapError::corrupt(dir, "invalid index header"));
    }

    let mut index = Vec::new();
    let mut pos = INDEX_HEADER_SIZE;
    while pos < bytes.len() {
        if pos + 12 > bytes.len() {
            return Err(WarcMapError::corrupt(dir, "truncated index record"));
        }
        let key_len = u32::from_le_bytes([
            bytes[pos],
            bytes[pos + 1],
            bytes[pos + 2],
            bytes[pos + 3],
        ]) as usize;
        let mut offset_bytes = [0u8; 8];
        offset_bytes.copy_from_slice(&bytes[pos + 4..pos + 12]);
        let offset = u64::from_le_bytes(offset_bytes);
        pos += 12;

        if pos + key_len > bytes.len() {
            return Err(WarcMapError::corrupt(dir, "truncated index key"));
        }
        if offset < data_start || offset >= data_end {
            return Err(WarcMapError::corrupt(
                dir,
                format!("index offset {} outside data section", offset),
            ));
        }
        index.push((bytes[pos..pos + key_len].to_vec(), offset));
        pos += key_len;
    }

    Ok(index)
}
