use super::{apply_batch_op, BucketMap};
use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyRange, KeyValueStore, ScanDirection, ScanVisitor};
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory key-value store.
///
/// Backs `memory://` addresses and unit tests. Contents are lost on drop.
#[derive(Default)]
pub struct InMemoryKVStore {
    buckets: BucketMap,
    closed: AtomicBool,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), KVStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KVStoreError::Closed);
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.atomic_batch_write(bucket, vec![BatchOperation::put(key, value)])
    }

    fn atomic_batch_write(
        &self,
        bucket: &str,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        self.ensure_open()?;
        self.buckets.update(bucket, |index| {
            for op in operations {
                apply_batch_op(index, op);
            }
        });
        Ok(())
    }

    fn scan(
        &self,
        bucket: &str,
        range: &KeyRange,
        direction: ScanDirection,
        visitor: &mut ScanVisitor<'_>,
    ) -> Result<(), KVStoreError> {
        self.ensure_open()?;
        self.buckets.scan(bucket, range, direction, visitor);
        Ok(())
    }

    fn count(&self, bucket: &str) -> Result<usize, KVStoreError> {
        self.ensure_open()?;
        Ok(self.buckets.count(bucket))
    }

    fn last_key(&self, bucket: &str) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.ensure_open()?;
        Ok(self.buckets.last_key(bucket))
    }

    fn buckets(&self) -> Result<Vec<String>, KVStoreError> {
        self.ensure_open()?;
        Ok(self.buckets.names())
    }

    fn close(&self) -> Result<(), KVStoreError> {
        self.closed.store(true, Ordering::Release);
        self.buckets.clear();
        Ok(())
    }
}
