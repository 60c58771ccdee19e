//! # Archive API Implementation
//!
//! Implements the ArchiveApi trait for writes, queries and expiry.

use super::*;
use crate::domain::entities::{ArchiveQuery, ArchiveStats, ExpiryReport, StoredMessage};
use crate::domain::errors::{KVStoreError, SerializationError};
use crate::ports::inbound::ArchiveApi;
use crate::ports::outbound::{KeyRange, ScanDirection};
use std::ops::ControlFlow;
use tracing::debug;

impl ArchiveApi for ArchiveEngine {
    fn write(&self, message: &Message) -> Result<EntryKey, ArchiveError> {
        self.ensure_open()?;
        if message.log_type.is_empty() {
            return Err(ArchiveError::InvalidLogType);
        }

        let value = self.serializer.serialize(&StoredMessage::from(message))?;

        let bucket = self.bucket(&message.log_type);
        let key = {
            let mut clock = bucket.write();
            let key = clock.next(message.utime);
            self.store.put(&message.log_type, &key.encode(), &value)?;
            key
        };

        debug!(
            log_type = %message.log_type,
            time = key.time,
            sequence = key.sequence,
            "Message archived"
        );
        Ok(key)
    }

    fn query(&self, query: &ArchiveQuery) -> Result<Vec<Message>, ArchiveError> {
        self.ensure_open()?;
        if query.log_type.is_empty() {
            return Err(ArchiveError::InvalidLogType);
        }
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let range = KeyRange::new(
            (query.start > 0).then(|| EntryKey::lower_bound(query.start).encode().to_vec()),
            (query.end != 0).then(|| EntryKey::lower_bound(query.end).encode().to_vec()),
        );
        // Without a start the newest matches are wanted, so walk backwards.
        let direction = if query.is_tail() {
            ScanDirection::Reverse
        } else {
            ScanDirection::Forward
        };

        // Filtered scans decode to match; plain ones copy bytes and decode
        // once the bucket is released.
        let filtered = !query.is_unfiltered();
        let mut found: Vec<StoredMessage> = Vec::new();
        let mut copied: Vec<Vec<u8>> = Vec::new();
        let mut decode_error: Option<SerializationError> = None;
        let mut scanned = 0usize;
        {
            let bucket = self.existing_bucket(&query.log_type);
            let _shared = bucket.as_ref().map(|lock| lock.read());
            self.store
                .scan(&query.log_type, &range, direction, &mut |_key, value| {
                    scanned += 1;
                    if filtered {
                        match self.serializer.deserialize(value) {
                            Ok(stored) if query.matches(&stored) => found.push(stored),
                            Ok(_) => {}
                            Err(e) => {
                                decode_error = Some(e);
                                return ControlFlow::Break(());
                            }
                        }
                    } else {
                        copied.push(value.to_vec());
                    }
                    if found.len() + copied.len() >= query.limit {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                })?;
        }
        if let Some(e) = decode_error {
            return Err(e.into());
        }
        for value in copied {
            found.push(self.serializer.deserialize(&value)?);
        }

        if direction == ScanDirection::Reverse {
            found.reverse();
        }

        debug!(
            log_type = %query.log_type,
            scanned,
            returned = found.len(),
            "Archive query"
        );
        Ok(found.into_iter().map(Message::from).collect())
    }

    fn expire(&self) -> Result<ExpiryReport, ArchiveError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(ArchiveError::Closed);
        }
        self.ensure_open()?;

        let now = self.time_source.now_nanos();
        let mut report = ExpiryReport::default();

        for (log_type, rule) in self.config.retention.prunable_types() {
            let bucket = self.bucket(log_type);
            let pruned = {
                let _exclusive = bucket.write();
                expiry::prune_bucket(self.store.as_ref(), log_type, rule, now)
            };
            match pruned {
                Ok(0) => {}
                Ok(removed) => {
                    report.buckets_pruned += 1;
                    report.entries_removed += removed;
                    debug!(log_type, ?rule, removed, "Bucket pruned");
                }
                Err(KVStoreError::Closed) => return Err(ArchiveError::Closed),
                Err(e) => {
                    report.buckets_failed += 1;
                    warn!(log_type, error = %e, "Failed to prune bucket");
                }
            }
        }

        if report.entries_removed > 0 {
            match self.store.compact() {
                Ok(true) => debug!("Store compacted after expiry"),
                Ok(false) => {}
                Err(KVStoreError::Closed) => return Err(ArchiveError::Closed),
                Err(e) => warn!(error = %e, "Store compaction failed"),
            }
        }

        if report.entries_removed > 0 || report.buckets_failed > 0 {
            info!(
                buckets_pruned = report.buckets_pruned,
                entries_removed = report.entries_removed,
                buckets_failed = report.buckets_failed,
                "Expiry pass complete"
            );
        }
        Ok(report)
    }

    fn stats(&self) -> Result<ArchiveStats, ArchiveError> {
        self.ensure_open()?;
        let mut stats = ArchiveStats::default();
        for bucket in self.store.buckets()? {
            let count = self.store.count(&bucket)?;
            stats.buckets.insert(bucket, count);
        }
        Ok(stats)
    }
}
