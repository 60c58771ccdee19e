//! # Domain Errors
//!
//! Error types for the Log Archive.
//!
//! - Configuration problems (`RetentionError`, `AddressError`) are fatal at startup.
//! - Store and codec failures surface from `query`/`expire`; the hub-facing
//!   write path only logs them.

use thiserror::Error;

/// Errors that can occur during archive operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// The engine was closed; no further operations are served.
    #[error("archive is closed")]
    Closed,

    /// Queries and writes need a bucket name.
    #[error("log type must not be empty")]
    InvalidLogType,

    /// Backing store failure.
    #[error("archive store error: {0}")]
    Store(KVStoreError),

    /// Stored value could not be encoded or decoded.
    #[error("archive codec error: {0}")]
    Serialization(#[from] SerializationError),

    /// Invalid retention configuration.
    #[error(transparent)]
    Retention(#[from] RetentionError),

    /// Invalid store address.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The hub refused the archive subscription.
    #[error("failed to subscribe archive to hub: {0}")]
    Subscribe(#[from] shared_bus::HubError),
}

impl From<KVStoreError> for ArchiveError {
    fn from(err: KVStoreError) -> Self {
        match err {
            KVStoreError::Closed => ArchiveError::Closed,
            other => ArchiveError::Store(other),
        }
    }
}

/// Key-value store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    /// The store was closed.
    #[error("KV store closed")]
    Closed,
}

impl KVStoreError {
    pub(crate) fn io(err: impl std::fmt::Display) -> Self {
        KVStoreError::IOError {
            message: err.to_string(),
        }
    }

    pub(crate) fn corruption(message: impl Into<String>) -> Self {
        KVStoreError::CorruptionError {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for KVStoreError {
    fn from(err: std::io::Error) -> Self {
        KVStoreError::io(err)
    }
}

/// Serialization errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("serialization error: {message}")]
pub struct SerializationError {
    pub message: String,
}

/// Malformed retention policy entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetentionError {
    /// The value does not follow the policy grammar.
    #[error("invalid retention policy for type '{log_type}': '{value}' ({reason})")]
    InvalidPolicy {
        log_type: String,
        value: String,
        reason: &'static str,
    },
}

/// Unusable store address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// No address given.
    #[error("store address is empty")]
    Empty,

    /// Not a parseable URL.
    #[error("invalid store address '{address}': {reason}")]
    Malformed { address: String, reason: String },

    /// The address names no location for a file-backed engine.
    #[error("store address '{0}' has no path")]
    MissingPath(String),
}
