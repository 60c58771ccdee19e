//! # Archive Entities
//!
//! Stored record layout, query parameters and pass reports.

use serde::{Deserialize, Serialize};
use shared_types::{tags_match, Message, Severity};
use std::collections::BTreeMap;

/// Archived form of a [`Message`].
///
/// `time` is not stored; it is rebuilt from `utime` on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub utime: i64,
    pub id: String,
    pub tags: Vec<String>,
    pub log_type: String,
    pub priority: u8,
    pub content: String,
    pub raw: Option<Vec<u8>>,
}

impl From<&Message> for StoredMessage {
    fn from(message: &Message) -> Self {
        Self {
            utime: message.utime,
            id: message.id.clone(),
            tags: message.tags.clone(),
            log_type: message.log_type.clone(),
            priority: message.priority,
            content: message.content.clone(),
            raw: message.raw.clone(),
        }
    }
}

impl From<StoredMessage> for Message {
    fn from(stored: StoredMessage) -> Self {
        Message {
            time: Message::time_from_nanos(stored.utime),
            utime: stored.utime,
            id: stored.id,
            tags: stored.tags,
            log_type: stored.log_type,
            priority: stored.priority,
            content: stored.content,
            raw: stored.raw,
        }
    }
}

/// Filtered time-range query against one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveQuery {
    /// Bucket to read.
    pub log_type: String,
    /// Exact `id` match when non-empty.
    pub host: String,
    /// Any-tag match when non-empty. Empty strings are ignored.
    pub tags: Vec<String>,
    /// Inclusive lower bound in unix nanoseconds; 0 means unbounded.
    pub start: i64,
    /// Exclusive upper bound in unix nanoseconds; 0 means unbounded.
    pub end: i64,
    /// Maximum results.
    pub limit: usize,
    /// Least severe level returned.
    pub min_severity: Severity,
}

impl ArchiveQuery {
    /// Unfiltered query for the newest 100 entries of `log_type`.
    pub fn new(log_type: impl Into<String>) -> Self {
        Self {
            log_type: log_type.into(),
            host: String::new(),
            tags: Vec::new(),
            start: 0,
            end: 0,
            limit: 100,
            min_severity: Severity::Trace,
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn range(mut self, start: i64, end: i64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Whether `message` passes the host, tag and severity filters.
    #[must_use]
    pub fn matches(&self, message: &StoredMessage) -> bool {
        (self.host.is_empty() || message.id == self.host)
            && self.min_severity.includes(message.priority)
            && tags_match(&message.tags, &self.tags)
    }

    /// Whether every entry in range passes the filters.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.host.is_empty()
            && self.min_severity == Severity::Trace
            && self.tags.iter().all(String::is_empty)
    }

    /// Whether results are the newest matches rather than the oldest.
    #[must_use]
    pub fn is_tail(&self) -> bool {
        self.start <= 0
    }
}

/// Result of one expiry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryReport {
    /// Buckets that lost at least one entry.
    pub buckets_pruned: usize,
    /// Entries deleted across all buckets.
    pub entries_removed: usize,
    /// Buckets whose prune failed; they are retried on the next pass.
    pub buckets_failed: usize,
}

/// Per-bucket entry counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub buckets: BTreeMap<String, usize>,
}

impl ArchiveStats {
    #[must_use]
    pub fn total_entries(&self) -> usize {
        self.buckets.values().sum()
    }

    #[must_use]
    pub fn entries(&self, log_type: &str) -> usize {
        self.buckets.get(log_type).copied().unwrap_or(0)
    }
}
