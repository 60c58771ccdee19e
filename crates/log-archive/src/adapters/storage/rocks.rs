//! # RocksDB Storage Adapter
//!
//! RocksDB implementation of the KeyValueStore trait.
//!
//! - One column family per bucket, created on first write
//! - Atomic batch writes (WriteBatch)
//! - Snappy compression

use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyRange, KeyValueStore, ScanDirection, ScanVisitor};
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column family names are `bucket:<log type>`, keeping clear of `default`.
const CF_PREFIX: &str = "bucket:";

/// RocksDB configuration.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Write buffer size in bytes (default: 64MB)
    pub write_buffer_size: usize,
    /// Maximum number of write buffers (default: 3)
    pub max_write_buffer_number: i32,
    /// Enable fsync after each write
    pub sync_writes: bool,
}

impl RocksDbConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffer_number: 3,
            sync_writes: false,
        }
    }

    /// Create config for testing (smaller buffers)
    pub fn for_testing(path: impl AsRef<Path>) -> Self {
        Self {
            write_buffer_size: 4 * 1024 * 1024,
            max_write_buffer_number: 2,
            ..Self::new(path)
        }
    }
}

/// RocksDB-backed key-value store implementing the KeyValueStore trait.
///
/// RocksDB is safe to share; the lock only guards column family creation
/// (write side) and the closed state.
pub struct RocksDbStore {
    /// `None` once closed.
    db: RwLock<Option<DB>>,
    buckets: RwLock<BTreeSet<String>>,
    config: RocksDbConfig,
}

fn cf_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
    opts
}

fn cf_name(bucket: &str) -> String {
    cf_name(bucket)
}

fn rocks_err(op: &str, e: rocksdb::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: format!("RocksDB {op} failed: {e}"),
    }
}

impl RocksDbStore {
    /// Open or create a RocksDB database with all existing buckets.
    pub fn open(config: RocksDbConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        // A fresh directory has no column family list yet.
        let existing = DB::list_cf(&opts, &config.path).unwrap_or_default();
        let buckets: BTreeSet<String> = existing
            .iter()
            .filter_map(|cf| cf.strip_prefix(CF_PREFIX))
            .map(str::to_string)
            .collect();
        let descriptors: Vec<ColumnFamilyDescriptor> = existing
            .into_iter()
            .filter(|cf| cf.starts_with(CF_PREFIX))
            .map(|cf| ColumnFamilyDescriptor::new(cf, cf_options()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, descriptors)
            .map_err(|e| rocks_err("open", e))?;

        info!(
            path = %config.path.display(),
            buckets = buckets.len(),
            "Opened RocksDB store"
        );
        Ok(Self {
            db: RwLock::new(Some(db)),
            buckets: RwLock::new(buckets),
            config,
        })
    }

    fn db(&self) -> Result<MappedRwLockReadGuard<'_, DB>, KVStoreError> {
        RwLockReadGuard::try_map(self.db.read(), Option::as_ref).map_err(|_| KVStoreError::Closed)
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }

    fn ensure_bucket(&self, bucket: &str) -> Result<(), KVStoreError> {
        if self.buckets.read().contains(bucket) {
            return Ok(());
        }
        let mut db = self.db.write();
        let db = db.as_mut().ok_or(KVStoreError::Closed)?;
        let mut buckets = self.buckets.write();
        if buckets.contains(bucket) {
            return Ok(());
        }
        db.create_cf(cf_name(bucket), &cf_options())
            .map_err(|e| rocks_err("create column family", e))?;
        buckets.insert(bucket.to_string());
        Ok(())
    }
}

impl KeyValueStore for RocksDbStore {
    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.atomic_batch_write(bucket, vec![BatchOperation::put(key, value)])
    }

    fn atomic_batch_write(
        &self,
        bucket: &str,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        self.ensure_bucket(bucket)?;
        let db = self.db()?;
        let cf = db
            .cf_handle(&cf_name(bucket))
            .ok_or_else(|| KVStoreError::corruption(format!("missing column family for {bucket}")))?;

        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put_cf(cf, key, value),
                BatchOperation::Delete { key } => batch.delete_cf(cf, key),
            }
        }

        db.write_opt(batch, &self.write_options())
            .map_err(|e| rocks_err("batch write", e))
    }

    fn scan(
        &self,
        bucket: &str,
        range: &KeyRange,
        direction: ScanDirection,
        visitor: &mut ScanVisitor<'_>,
    ) -> Result<(), KVStoreError> {
        let db = self.db()?;
        if range.is_empty() {
            return Ok(());
        }
        let Some(cf) = db.cf_handle(&cf_name(bucket)) else {
            return Ok(());
        };

        let mode = match (direction, &range.from, &range.until) {
            (ScanDirection::Forward, Some(from), _) => IteratorMode::From(from.as_slice(), Direction::Forward),
            (ScanDirection::Forward, None, _) => IteratorMode::Start,
            (ScanDirection::Reverse, _, Some(until)) => IteratorMode::From(until.as_slice(), Direction::Reverse),
            (ScanDirection::Reverse, _, None) => IteratorMode::End,
        };

        for item in db.iterator_cf(cf, mode) {
            let (key, value) = item.map_err(|e| rocks_err("scan", e))?;
            if !range.contains(&key) {
                let past_end = match direction {
                    ScanDirection::Forward => true,
                    // Reverse seek lands at or before `until`; skip an exact hit.
                    ScanDirection::Reverse => range.until.as_deref() != Some(&key[..]),
                };
                if past_end {
                    break;
                }
                continue;
            }
            if visitor(&key, &value).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn count(&self, bucket: &str) -> Result<usize, KVStoreError> {
        let db = self.db()?;
        let Some(cf) = db.cf_handle(&cf_name(bucket)) else {
            return Ok(0);
        };
        let mut count = 0;
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            item.map_err(|e| rocks_err("count", e))?;
            count += 1;
        }
        Ok(count)
    }

    fn buckets(&self) -> Result<Vec<String>, KVStoreError> {
        let db = self.db()?;
        let mut non_empty = Vec::new();
        for bucket in self.buckets.read().iter() {
            if let Some(cf) = db.cf_handle(&cf_name(bucket)) {
                if db.iterator_cf(cf, IteratorMode::Start).next().is_some() {
                    non_empty.push(bucket.clone());
                }
            }
        }
        Ok(non_empty)
    }

    fn flush(&self) -> Result<(), KVStoreError> {
        self.db()?.flush().map_err(|e| rocks_err("flush", e))
    }

    fn close(&self) -> Result<(), KVStoreError> {
        let mut db = self.db.write();
        let Some(open) = db.as_ref() else {
            return Ok(());
        };
        open.flush().map_err(|e| rocks_err("flush", e))?;
        *db = None;
        info!(path = %self.config.path.display(), "Closed RocksDB store");
        Ok(())
    }
}
