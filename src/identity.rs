//! Record Identity
//!
//! Deterministic, name-based (version 5 style) record UUIDs.
//!
//! ```text
//! uuid = SHA-1("webis" ":" prefix ":" natural_key)[0..16]
//!        with version nibble = 5 and RFC 4122 variant bits
//! ```
//!
//! The generator and the lookup tool must derive identical UUIDs for the
//! same `(prefix, natural_key)`; nothing here depends on run state.

use sha1::{Digest, Sha1};
use uuid::Uuid;

/// Fixed namespace mixed into every record UUID
pub const UUID_NAMESPACE: &str = "webis";

/// Derive the UUID of a record from its prefix and natural key
pub fn generate_id(prefix: &str, natural_key: &str) -> Uuid {
    let mut hasher = Sha1::new();
    hasher.update(UUID_NAMESPACE.as_bytes());
    hasher.update(b":");
    hasher.update(prefix.as_bytes());
    hasher.update(b":");
    hasher.update(natural_key.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    bytes[6] = (bytes[6] & 0x0f) | 0x50; // version 5
    bytes[8] = (bytes[8] & 0x3f) | 0x80; // RFC 4122 variant
    Uuid::from_bytes(bytes)
}

/// UUID generator bound to one prefix
#[derive(Debug, Clone)]
pub struct RecordIdGenerator {
    prefix: String,
}

impl RecordIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generate(&self, natural_key: &str) -> Uuid {
        generate_id(&self.prefix, natural_key)
    }
}
