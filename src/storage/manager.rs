//! Shard Store
//!
//! Point lookups against a partitioned store.
//!
//! ## Responsibilities
//! - Derive the lookup key (UUID, `(prefix, name)` or URI)
//! - Compute the one partition that can hold it
//! - Open that shard's container (cached) and do an indexed lookup
//!
//! A miss is `Ok(None)`. That includes shards that were never written
//! because no key hashed to them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, WarcMapError};
use crate::identity::generate_id;
use crate::partition::{partition_for, OutputStream};

use super::mapfile::{is_container, MapFileReader};

/// What the caller is looking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    /// A record UUID
    Uuid(Uuid),
    /// A natural key, turned into a UUID with the given prefix
    Name { prefix: String, name: String },
    /// A target URI, resolved through the URI shards
    Uri(String),
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::Uuid(uuid) => write!(f, "uuid={}", uuid),
            LookupKey::Name { prefix, name } => write!(f, "prefix={}, name={}", prefix, name),
            LookupKey::Uri(uri) => write!(f, "uri={}", uri),
        }
    }
}

/// A found record and where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHit {
    pub uuid: Uuid,
    pub partition: u32,
    /// Container that held the record
    pub container: PathBuf,
    /// Stored JSON document
    pub record: String,
}

/// Read-only view over a partitioned store
///
/// ## Concurrency:
/// - `readers`: RwLock around the cache of opened containers
/// - Lookups take `&self`; each reader serializes its own file access
pub struct ShardStore {
    root: PathBuf,
    num_partitions: u32,
    readers: RwLock<HashMap<(OutputStream, u32), Arc<MapFileReader>>>,
}

impl ShardStore {
    /// Open a store directory built with `num_partitions` partitions
    pub fn open(root: &Path, num_partitions: u32) -> Result<Self> {
        if num_partitions == 0 {
            return Err(WarcMapError::Config(
                "number of partitions must be at least 1".to_string(),
            ));
        }
        if !root.is_dir() {
            return Err(WarcMapError::Config(format!(
                "store directory {} does not exist",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
            num_partitions,
            readers: RwLock::new(HashMap::new()),
        })
    }

    /// Raw lookup of a bare key in one stream.
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found
    /// - `Ok(None)`: key (or its whole shard) absent
    pub fn lookup(&self, key: &str, stream: OutputStream) -> Result<Option<Vec<u8>>> {
        let partition = self.partition(key);
        match self.reader(stream, partition)? {
            Some(reader) => reader.get(key.as_bytes()),
            None => Ok(None),
        }
    }

    /// Fetch a data record by UUID
    pub fn get_record(&self, uuid: &Uuid) -> Result<Option<RecordHit>> {
        let key = uuid.to_string();
        let partition = self.partition(&key);
        let Some(value) = self.lookup(&key, OutputStream::Data)? else {
            return Ok(None);
        };
        Ok(Some(RecordHit {
            uuid: *uuid,
            partition,
            container: self.container_path(OutputStream::Data, partition),
            record: String::from_utf8_lossy(&value).into_owned(),
        }))
    }

    /// Resolve a URI to the UUID of its data record
    pub fn resolve_uri(&self, uri: &str) -> Result<Option<Uuid>> {
        let Some(value) = self.lookup(uri, OutputStream::Uri)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&value);
        // Older stores kept the composite "data" key as reference
        let reference = text.trim();
        let reference = reference
            .strip_prefix(OutputStream::Data.prefix())
            .unwrap_or(reference);
        let uuid = Uuid::parse_str(reference).map_err(|e| {
            let partition = self.partition(uri);
            WarcMapError::corrupt(
                self.container_path(OutputStream::Uri, partition),
                format!("URI entry holds no UUID ({}): {:?}", e, text),
            )
        })?;
        Ok(Some(uuid))
    }

    /// Fetch a data record by any kind of lookup key
    pub fn find(&self, key: &LookupKey) -> Result<Option<RecordHit>> {
        let uuid = match key {
            LookupKey::Uuid(uuid) => *uuid,
            LookupKey::Name { prefix, name } => generate_id(prefix, name),
            LookupKey::Uri(uri) => match self.resolve_uri(uri)? {
                Some(uuid) => uuid,
                None => return Ok(None),
            },
        };
        self.get_record(&uuid)
    }

    /// Partition of a bare key in this store
    pub fn partition(&self, key: &str) -> u32 {
        partition_for(key, self.num_partitions)
    }

    /// `{root}/{stream}-r-{partition:05}`
    pub fn container_path(&self, stream: OutputStream, partition: u32) -> PathBuf {
        self.root.join(stream.shard_name(partition))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn num_partitions(&self) -> u32 {
        self.num_partitions
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Cached reader for a shard, `None` if the shard was never written
    fn reader(&self, stream: OutputStream, partition: u32) -> Result<Option<Arc<MapFileReader>>> {
        if let Some(reader) = self.readers.read().get(&(stream, partition)) {
            return Ok(Some(Arc::clone(reader)));
        }

        let path = self.container_path(stream, partition);
        if !is_container(&path) {
            debug!(path = %path.display(), "shard not present");
            return Ok(None);
        }

        let reader = Arc::new(MapFileReader::open(&path)?);
        let mut readers = self.readers.write();
        let cached = readers
            .entry((stream, partition))
            .or_insert_with(|| Arc::clone(&reader));
        Ok(Some(Arc::clone(cached)))
    }
}
