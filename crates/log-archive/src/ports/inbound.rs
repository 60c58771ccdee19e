//! # Inbound Ports (Driving Ports)
//!
//! The API the query boundary and the hub wiring use.

use crate::domain::entities::{ArchiveQuery, ArchiveStats, ExpiryReport};
use crate::domain::errors::ArchiveError;
use crate::domain::keys::EntryKey;
use shared_types::Message;

/// Primary API for the Log Archive.
///
/// All operations fail with [`ArchiveError::Closed`] once the archive is
/// closed.
pub trait ArchiveApi: Send + Sync {
    /// Append `message` to the bucket named by its type.
    ///
    /// ## Errors
    ///
    /// - `InvalidLogType`: the message has no type
    /// - `Store` / `Serialization`: the entry was not persisted
    fn write(&self, message: &Message) -> Result<EntryKey, ArchiveError>;

    /// Read messages from one bucket, oldest first.
    ///
    /// No matches is an empty result, not an error.
    ///
    /// ## Errors
    ///
    /// - `InvalidLogType`: `query.log_type` is empty
    /// - `Store` / `Serialization`: the bucket could not be read
    fn query(&self, query: &ArchiveQuery) -> Result<Vec<Message>, ArchiveError>;

    /// Run one retention pass over every bucket with a rule.
    fn expire(&self) -> Result<ExpiryReport, ArchiveError>;

    /// Entry counts per bucket.
    fn stats(&self) -> Result<ArchiveStats, ArchiveError>;
}
