//! Storage Adapters
//!
//! Implementations of the `KeyValueStore` trait and engine selection by
//! address.

mod file;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocks;

pub use file::FileBackedKVStore;
pub use memory::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use rocks::{RocksDbConfig, RocksDbStore};

use crate::domain::address::{EngineKind, StoreAddress};
use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyRange, KeyValueStore, ScanDirection, ScanVisitor};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Ordered contents of one bucket.
pub(crate) type BucketIndex = BTreeMap<Vec<u8>, Vec<u8>>;

/// Copied bucket contents, bucket by bucket in name order.
pub(crate) type Snapshot = Vec<(String, Vec<(Vec<u8>, Vec<u8>)>)>;

/// Bucket indexes, each behind its own lock.
///
/// The outer map lock is only held to find or create a bucket. Buckets are
/// never removed while the map is live, so a handle taken from it always
/// stays the bucket's index; emptied buckets are hidden from [`names`].
///
/// Lock order is map, then bucket, then whatever the caller guards inside
/// [`update`](BucketMap::update).
///
/// [`names`]: BucketMap::names
#[derive(Default)]
pub(crate) struct BucketMap {
    buckets: RwLock<BTreeMap<String, Arc<RwLock<BucketIndex>>>>,
}

impl BucketMap {
    pub(crate) fn from_indexes(indexes: BTreeMap<String, BucketIndex>) -> Self {
        let buckets = indexes
            .into_iter()
            .map(|(name, index)| (name, Arc::new(RwLock::new(index))))
            .collect();
        Self {
            buckets: RwLock::new(buckets),
        }
    }

    fn get(&self, bucket: &str) -> Option<Arc<RwLock<BucketIndex>>> {
        self.buckets.read().get(bucket).cloned()
    }

    fn get_or_create(&self, bucket: &str) -> Arc<RwLock<BucketIndex>> {
        if let Some(index) = self.get(bucket) {
            return index;
        }
        Arc::clone(self.buckets.write().entry(bucket.to_string()).or_default())
    }

    /// Run `f` on one bucket's index under its write lock.
    pub(crate) fn update<R>(&self, bucket: &str, f: impl FnOnce(&mut BucketIndex) -> R) -> R {
        let index = self.get_or_create(bucket);
        let mut guard = index.write();
        f(&mut guard)
    }

    pub(crate) fn scan(
        &self,
        bucket: &str,
        range: &KeyRange,
        direction: ScanDirection,
        visitor: &mut ScanVisitor<'_>,
    ) {
        if let Some(index) = self.get(bucket) {
            scan_index(&index.read(), range, direction, visitor);
        }
    }

    pub(crate) fn count(&self, bucket: &str) -> usize {
        self.get(bucket).map_or(0, |index| index.read().len())
    }

    pub(crate) fn last_key(&self, bucket: &str) -> Option<Vec<u8>> {
        self.get(bucket)
            .and_then(|index| index.read().keys().next_back().cloned())
    }

    /// Names of non-empty buckets, sorted.
    pub(crate) fn names(&self) -> Vec<String> {
        self.buckets
            .read()
            .iter()
            .filter(|(_, index)| !index.read().is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Copy of every non-empty bucket, taken while no bucket can change.
    ///
    /// `at` runs with every bucket read-locked, so whatever it observes is
    /// consistent with the copy.
    pub(crate) fn snapshot_with<R>(&self, at: impl FnOnce() -> R) -> (Snapshot, R) {
        let buckets = self.buckets.read();
        let guards: Vec<_> = buckets
            .iter()
            .map(|(name, index)| (name, index.read()))
            .collect();
        let observed = at();
        let snapshot = guards
            .iter()
            .filter(|(_, index)| !index.is_empty())
            .map(|(name, index)| {
                let entries = index.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                (String::clone(name), entries)
            })
            .collect();
        (snapshot, observed)
    }

    pub(crate) fn clear(&self) {
        self.buckets.write().clear();
    }
}

/// Open the engine an address selects.
pub fn open_store(address: &StoreAddress) -> Result<Box<dyn KeyValueStore>, KVStoreError> {
    match (address.engine, &address.path) {
        (EngineKind::Memory, _) => Ok(Box::new(InMemoryKVStore::new())),
        #[cfg(feature = "rocksdb")]
        (EngineKind::RocksDb, Some(path)) => {
            Ok(Box::new(RocksDbStore::open(RocksDbConfig::new(path))?))
        }
        #[cfg(not(feature = "rocksdb"))]
        (EngineKind::RocksDb, Some(path)) => {
            tracing::warn!(
                path = %path.display(),
                "RocksDB support not compiled in, using file journal"
            );
            Ok(Box::new(FileBackedKVStore::open(path)?))
        }
        (EngineKind::File, Some(path)) => Ok(Box::new(FileBackedKVStore::open(path)?)),
        (_, None) => Err(KVStoreError::IOError {
            message: format!("store address '{address}' has no path"),
        }),
    }
}

pub(crate) fn apply_batch_op(index: &mut BucketIndex, op: BatchOperation) {
    match op {
        BatchOperation::Put { key, value } => {
            index.insert(key, value);
        }
        BatchOperation::Delete { key } => {
            index.remove(&key);
        }
    }
}

fn scan_index(
    index: &BucketIndex,
    range: &KeyRange,
    direction: ScanDirection,
    visitor: &mut ScanVisitor<'_>,
) {
    if range.is_empty() {
        return;
    }
    let lower = range
        .from
        .as_deref()
        .map_or(Bound::Unbounded, Bound::Included);
    let upper = range
        .until
        .as_deref()
        .map_or(Bound::Unbounded, Bound::Excluded);
    let entries = index.range::<[u8], _>((lower, upper));

    match direction {
        ScanDirection::Forward => visit(entries, visitor),
        ScanDirection::Reverse => visit(entries.rev(), visitor),
    }
}

fn visit<'a>(
    entries: impl Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)>,
    visitor: &mut ScanVisitor<'_>,
) {
    for (key, value) in entries {
        if visitor(key, value).is_break() {
            break;
        }
    }
}
