//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the Archive Engine.

use crate::domain::entities::StoredMessage;
use crate::domain::errors::{KVStoreError, SerializationError};
use std::ops::ControlFlow;

/// Visitor handed to [`KeyValueStore::scan`]; return `Break` to stop early.
pub type ScanVisitor<'a> = dyn FnMut(&[u8], &[u8]) -> ControlFlow<()> + 'a;

/// Ordered key-value store with named buckets.
///
/// Default: `FileBackedKVStore` (append-only journal)
/// Production: `RocksDbStore` (feature `rocksdb`)
/// Testing: `InMemoryKVStore`
///
/// Keys within a bucket are compared as raw bytes. A bucket that was never
/// written scans as empty.
///
/// Stores are shared between threads and keep their own consistency: a
/// scan sees each batch entirely or not at all, and writes to one bucket
/// never wait on a scan of another.
pub trait KeyValueStore: Send + Sync {
    /// Put a single key-value pair.
    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write against one bucket.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(
        &self,
        bucket: &str,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError>;

    /// Visit entries of `bucket` within `range`, in key order or reversed.
    fn scan(
        &self,
        bucket: &str,
        range: &KeyRange,
        direction: ScanDirection,
        visitor: &mut ScanVisitor<'_>,
    ) -> Result<(), KVStoreError>;

    /// Number of entries in `bucket`.
    fn count(&self, bucket: &str) -> Result<usize, KVStoreError>;

    /// Greatest key in `bucket`.
    fn last_key(&self, bucket: &str) -> Result<Option<Vec<u8>>, KVStoreError> {
        let mut last = None;
        self.scan(bucket, &KeyRange::all(), ScanDirection::Reverse, &mut |key, _| {
            last = Some(key.to_vec());
            ControlFlow::Break(())
        })?;
        Ok(last)
    }

    /// Names of all non-empty buckets.
    fn buckets(&self) -> Result<Vec<String>, KVStoreError>;

    /// Reclaim space held by deleted or overwritten entries.
    ///
    /// Returns whether any work was done. Writers may be held off only for
    /// the final swap, never for the whole rewrite.
    fn compact(&self) -> Result<bool, KVStoreError> {
        Ok(false)
    }

    /// Make every acknowledged write durable.
    fn flush(&self) -> Result<(), KVStoreError> {
        Ok(())
    }

    /// Release resources. Later calls fail with [`KVStoreError::Closed`].
    fn close(&self) -> Result<(), KVStoreError> {
        self.flush()
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Half-open key range `[from, until)`; `None` is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub from: Option<Vec<u8>>,
    pub until: Option<Vec<u8>>,
}

impl KeyRange {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(from: Option<Vec<u8>>, until: Option<Vec<u8>>) -> Self {
        Self { from, until }
    }

    /// Whether no key can fall inside the range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!((&self.from, &self.until), (Some(f), Some(u)) if f >= u)
    }

    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.from.as_deref().map_or(true, |f| key >= f)
            && self.until.as_deref().map_or(true, |u| key < u)
    }
}

/// Scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Oldest first.
    Forward,
    /// Newest first.
    Reverse,
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current time in unix nanoseconds.
    fn now_nanos(&self) -> i64;
}

/// Abstract interface for archived value encoding.
pub trait MessageSerializer: Send + Sync {
    /// Serialize a StoredMessage to bytes.
    fn serialize(&self, message: &StoredMessage) -> Result<Vec<u8>, SerializationError>;

    /// Deserialize bytes to a StoredMessage.
    fn deserialize(&self, data: &[u8]) -> Result<StoredMessage, SerializationError>;
}
