//! File journal store.
//!
//! ```text
//! ┌──────────┬────────────┬──────────────────────────────┐
//! │ len: u32 │ crc32: u32 │ payload: bincode JournalRecord│  ... repeated
//! └──────────┴────────────┴──────────────────────────────┘
//! ```
//!
//! Every `put`/batch appends one record, so a batch is replayed entirely or
//! not at all. Replay stops at the first torn or corrupt record. The journal
//! is rewritten from the live index on open and by [`KeyValueStore::compact`]
//! once dead records outnumber live entries.
//!
//! ## Compaction
//!
//! ```text
//! lock journal ─► snapshot index, mark length ─► unlock
//!                 write snapshot to <path>.tmp  (writers keep appending)
//! lock journal ─► copy records past the mark ─► fsync ─► rename ─► reopen
//! ```

use super::{BucketIndex, BucketMap, Snapshot};
use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyRange, KeyValueStore, ScanDirection, ScanVisitor};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

const FRAME_HEADER_LEN: usize = 8;

/// Dead records tolerated before the journal is rewritten.
const MIN_COMPACTION_RECORDS: usize = 1024;

/// Entries per record when rewriting the journal.
const COMPACTION_CHUNK: usize = 4096;

#[derive(Serialize, Deserialize)]
struct JournalRecord {
    bucket: String,
    ops: Vec<JournalOp>,
}

#[derive(Serialize, Deserialize)]
enum JournalOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

impl From<BatchOperation> for JournalOp {
    fn from(op: BatchOperation) -> Self {
        match op {
            BatchOperation::Put { key, value } => JournalOp::Put(key, value),
            BatchOperation::Delete { key } => JournalOp::Delete(key),
        }
    }
}

/// Journal handle and the counters that move with it.
#[derive(Debug, Default)]
struct Journal {
    /// `None` while closed, or after a failed reopen until the next append
    /// manages to reopen the file.
    file: Option<File>,
    closed: bool,
    len: u64,
    /// Operations recorded in the journal since it was last rewritten.
    ops: usize,
    live_entries: usize,
}

impl Journal {
    fn ensure_open(&self) -> Result<(), KVStoreError> {
        if self.closed {
            return Err(KVStoreError::Closed);
        }
        Ok(())
    }

    fn dead_records(&self) -> usize {
        self.ops.saturating_sub(self.live_entries)
    }
}

/// File-backed key-value store, the default archive engine.
///
/// Keeps an ordered in-memory index for reads and an append-only journal on
/// disk for durability. Needs no native dependencies.
///
/// A write holds its bucket's index lock, appends under the journal lock and
/// applies to the index before letting go of either, so each bucket's index
/// always equals the journal replayed up to the last append.
pub struct FileBackedKVStore {
    path: PathBuf,
    buckets: BucketMap,
    journal: Mutex<Journal>,
    /// Mirrors `Journal::closed` for readers that never touch the journal.
    closed: AtomicBool,
    /// Held for a whole rewrite so two never interleave.
    rewriting: Mutex<()>,
    sync_writes: bool,
}

impl FileBackedKVStore {
    /// Open or create the journal at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let (buckets, replay) = match fs::read(&path) {
            Ok(bytes) => replay(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => (BTreeMap::new(), Replay::default()),
            Err(e) => return Err(e.into()),
        };
        if replay.discarded_bytes > 0 {
            warn!(
                path = %path.display(),
                records = replay.records,
                discarded_bytes = replay.discarded_bytes,
                "Journal has a torn or corrupt tail, discarding it"
            );
        }

        let live_entries = buckets.values().map(BTreeMap::len).sum();
        let bucket_count = buckets.len();
        let store = Self {
            path,
            buckets: BucketMap::from_indexes(buckets),
            journal: Mutex::new(Journal {
                live_entries,
                ..Journal::default()
            }),
            closed: AtomicBool::new(false),
            rewriting: Mutex::new(()),
            sync_writes: false,
        };
        store.rewrite()?;

        info!(
            path = %store.path.display(),
            buckets = bucket_count,
            entries = live_entries,
            "Opened file journal"
        );
        Ok(store)
    }

    /// fsync after every record instead of only on `flush`.
    #[must_use]
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Current journal size in bytes.
    pub fn journal_len(&self) -> u64 {
        self.journal.lock().len
    }

    fn ensure_open(&self) -> Result<(), KVStoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KVStoreError::Closed);
        }
        Ok(())
    }

    /// Append one record. On failure the file is cut back to its previous
    /// length so later records stay replayable.
    fn append(&self, journal: &mut Journal, frame: &[u8], ops: usize) -> Result<(), KVStoreError> {
        journal.ensure_open()?;
        if journal.file.is_none() {
            journal.file = Some(open_for_append(&self.path)?);
            info!(path = %self.path.display(), "Reopened file journal");
        }
        let Some(file) = journal.file.as_mut() else {
            return Err(KVStoreError::Closed);
        };

        let written = file
            .write_all(frame)
            .and_then(|()| if self.sync_writes { file.sync_data() } else { Ok(()) });
        if let Err(e) = written {
            if let Err(truncate) = file.set_len(journal.len) {
                warn!(error = %truncate, "Failed to roll back partial journal record");
            }
            return Err(e.into());
        }

        journal.len += frame.len() as u64;
        journal.ops += ops;
        Ok(())
    }

    /// Rewrite the journal from the live index.
    ///
    /// Writers are held off while the index is copied and again while the
    /// records appended during the rewrite are carried over, not while the
    /// copy is written out.
    fn rewrite(&self) -> Result<(), KVStoreError> {
        let _rewriting = self.rewriting.lock();
        let (snapshot, mark) = self.buckets.snapshot_with(|| {
            let journal = self.journal.lock();
            journal.ensure_open().map(|()| (journal.len, journal.ops))
        });
        let (mark, ops_at_mark) = mark?;

        let temp_path = self.path.with_extension("tmp");
        let result = self.rewrite_into(&temp_path, snapshot, mark, ops_at_mark);
        if result.is_err() {
            if let Err(e) = fs::remove_file(&temp_path) {
                debug!(path = %temp_path.display(), error = %e, "No temp journal to remove");
            }
        }
        result
    }

    fn rewrite_into(
        &self,
        temp_path: &Path,
        snapshot: Snapshot,
        mark: u64,
        ops_at_mark: usize,
    ) -> Result<(), KVStoreError> {
        let mut out = BufWriter::new(File::create(temp_path)?);
        let mut written = 0u64;
        let mut snapshot_entries = 0usize;

        for (bucket, entries) in snapshot {
            snapshot_entries += entries.len();
            for chunk in entries.chunks(COMPACTION_CHUNK) {
                let record = JournalRecord {
                    bucket: bucket.clone(),
                    ops: chunk
                        .iter()
                        .map(|(k, v)| JournalOp::Put(k.clone(), v.clone()))
                        .collect(),
                };
                let frame = encode_frame(&record)?;
                out.write_all(&frame)?;
                written += frame.len() as u64;
            }
        }
        out.flush()?;
        out.get_ref().sync_data()?;

        let mut journal = self.journal.lock();
        journal.ensure_open()?;

        // Records appended while the snapshot was being written.
        let tail_len = journal.len.saturating_sub(mark);
        if tail_len > 0 {
            let mut old = File::open(&self.path)?;
            old.seek(SeekFrom::Start(mark))?;
            let copied = std::io::copy(&mut old.take(tail_len), &mut out)?;
            if copied != tail_len {
                return Err(KVStoreError::io(format!(
                    "journal tail shrank during compaction ({copied} of {tail_len} bytes)"
                )));
            }
            written += tail_len;
        }

        let file = out.into_inner().map_err(|e| KVStoreError::io(e.error()))?;
        file.sync_all()?;
        drop(file);
        fs::rename(temp_path, &self.path)?;

        // The old handle now points at an unlinked file.
        journal.file = None;
        journal.len = written;
        journal.ops = snapshot_entries + journal.ops.saturating_sub(ops_at_mark);
        sync_parent_dir(&self.path)?;
        journal.file = Some(open_for_append(&self.path)?);
        Ok(())
    }
}

fn open_for_append(path: &Path) -> Result<File, KVStoreError> {
    Ok(OpenOptions::new().append(true).open(path)?)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<(), KVStoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<(), KVStoreError> {
    Ok(())
}

impl KeyValueStore for FileBackedKVStore {
    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.atomic_batch_write(bucket, vec![BatchOperation::put(key, value)])
    }

    fn atomic_batch_write(
        &self,
        bucket: &str,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        self.ensure_open()?;
        if operations.is_empty() {
            return Ok(());
        }

        let record = JournalRecord {
            bucket: bucket.to_string(),
            ops: operations.into_iter().map(JournalOp::from).collect(),
        };
        let frame = encode_frame(&record)?;

        self.buckets.update(bucket, |index| {
            let mut journal = self.journal.lock();
            self.append(&mut journal, &frame, record.ops.len())?;
            let before = index.len();
            for op in record.ops {
                apply_op(index, op);
            }
            journal.live_entries = journal.live_entries + index.len() - before;
            Ok(())
        })
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

    fn compact(&self) -> Result<bool, KVStoreError> {
        let (dead, live) = {
            let journal = self.journal.lock();
            journal.ensure_open()?;
            (journal.dead_records(), journal.live_entries)
        };
        if dead < MIN_COMPACTION_RECORDS || dead <= live {
            return Ok(false);
        }

        debug!(dead, live, "Compacting journal");
        self.rewrite()?;
        Ok(true)
    }

    fn flush(&self) -> Result<(), KVStoreError> {
        let mut journal = self.journal.lock();
        journal.ensure_open()?;
        if let Some(file) = journal.file.as_mut() {
            file.flush()?;
            file.sync_data()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), KVStoreError> {
        let mut journal = self.journal.lock();
        if journal.closed {
            return Ok(());
        }
        if let Some(file) = journal.file.as_mut() {
            file.flush()?;
            file.sync_data()?;
        }
        journal.closed = true;
        journal.file = None;
        self.closed.store(true, Ordering::Release);
        drop(journal);
        self.buckets.clear();
        info!(path = %self.path.display(), "Closed file journal");
        Ok(())
    }
}

fn apply_op(index: &mut BucketIndex, op: JournalOp) {
    match op {
        JournalOp::Put(key, value) => {
            index.insert(key, value);
        }
        JournalOp::Delete(key) => {
            index.remove(&key);
        }
    }
}

fn encode_frame(record: &JournalRecord) -> Result<Vec<u8>, KVStoreError> {
    let payload = bincode::serialize(record).map_err(KVStoreError::io)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| KVStoreError::io(format!("journal record of {} bytes", payload.len())))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

#[derive(Debug, Default)]
struct Replay {
    records: usize,
    discarded_bytes: usize,
}

fn replay(bytes: &[u8]) -> (BTreeMap<String, BucketIndex>, Replay) {
    let mut buckets: BTreeMap<String, BucketIndex> = BTreeMap::new();
    let mut outcome = Replay::default();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        let Some((record, frame_len)) = read_frame(bytes, cursor) else {
            break;
        };
        let index = buckets.entry(record.bucket.clone()).or_default();
        for op in record.ops {
            apply_op(index, op);
        }
        if index.is_empty() {
            buckets.remove(&record.bucket);
        }
        outcome.records += 1;
        cursor += frame_len;
    }

    outcome.discarded_bytes = bytes.len() - cursor;
    (buckets, outcome)
}

fn read_frame(bytes: &[u8], cursor: usize) -> Option<(JournalRecord, usize)> {
    let header = bytes.get(cursor..cursor.checked_add(FRAME_HEADER_LEN)?)?;
    let len = u32::from_le_bytes(header[..4].try_into().ok()?) as usize;
    let crc = u32::from_le_bytes(header[4..].try_into().ok()?);

    let start = cursor + FRAME_HEADER_LEN;
    let payload = bytes.get(start..start.checked_add(len)?)?;
    if crc32fast::hash(payload) != crc {
        return None;
    }
    let record = bincode::deserialize(payload).ok()?;
    Some((record, FRAME_HEADER_LEN + len))
}
