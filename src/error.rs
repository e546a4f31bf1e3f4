//! Error types for warcmap
//!
//! Provides a unified error type for parsing, storage, merge and lookup.
//! Malformed WARC records and lookup misses are not errors: the parser
//! skips the former and lookups return `Ok(None)` for the latter.

use thiserror::Error;

/// Result type alias using WarcMapError
pub type Result<T> = std::result::Result<T, WarcMapError>;

/// Unified error type for warcmap operations
#[derive(Debug, Error)]
pub enum WarcMapError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Container Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt container {path}: {reason}")]
    CorruptContainer { path: String, reason: String },

    #[error("Containers cannot be merged: {0}")]
    IncompatibleContainers(String),

    #[error("Key out of order in {output}: {key:?} after {last:?}")]
    OrderViolation {
        output: String,
        last: String,
        key: String,
    },

    #[error("No containers found: {0}")]
    NoContainersFound(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path pattern: {0}")]
    Pattern(String),

    #[error("Input format '{0}' is not supported (supported: clueweb09, clueweb12, commoncrawl)")]
    UnsupportedFormat(String),
}

impl WarcMapError {
    pub(crate) fn corrupt(path: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        WarcMapError::CorruptContainer {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for WarcMapError {
    fn from(e: bincode::Error) -> Self {
        WarcMapError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for WarcMapError {
    fn from(e: serde_json::Error) -> Self {
        WarcMapError::Serialization(e.to_string())
    }
}

impl From<glob::PatternError> for WarcMapError {
    fn from(e: glob::PatternError) -> Self {
        WarcMapError::Pattern(e.to_string())
    }
}
