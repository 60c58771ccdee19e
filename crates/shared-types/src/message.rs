//! # Log Message
//!
//! The atomic log record accepted from producers, fanned out by the hub and
//! archived per log type.
//!
//! ## Wire Format
//!
//! ```json
//! {"time":"2024-05-01T10:00:00Z","utime":1714557600000000000,"id":"web-1",
//!  "tag":["nginx"],"type":"app","priority":3,"message":"GET / 200"}
//! ```
//!
//! Every field is optional on input; the ingestion boundary fills `type` and
//! stamps `time`/`utime` before publishing.

use crate::severity::Severity;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A single structured log event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Calendar capture time.
    pub time: DateTime<Utc>,
    /// Capture time as unix nanoseconds. This is the ordering key.
    pub utime: i64,
    /// Originating host or source identifier.
    pub id: String,
    /// Free-form labels.
    #[serde(rename = "tag")]
    pub tags: Vec<String>,
    /// Log category, also the archive bucket name.
    #[serde(rename = "type")]
    pub log_type: String,
    /// Numeric severity, see [`Severity`].
    pub priority: u8,
    /// Textual payload.
    #[serde(rename = "message")]
    pub content: String,
    /// Raw payload as received, when it differs from `content`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Vec<u8>>,
}

impl Message {
    /// Create a message of `log_type` stamped with the current time.
    pub fn new(log_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            log_type: log_type.into(),
            content: content.into(),
            priority: Severity::Info.as_priority(),
            ..Default::default()
        }
        .stamped_at(Utc::now())
    }

    /// Set the source identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the tag list.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the raw priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the priority from a severity level.
    #[must_use]
    pub fn with_severity(self, severity: Severity) -> Self {
        self.with_priority(severity.as_priority())
    }

    /// Attach the raw payload.
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Re-stamp the message with `time`.
    #[must_use]
    pub fn stamped_at(mut self, time: DateTime<Utc>) -> Self {
        self.stamp(time);
        self
    }

    /// Set `time` and `utime` together so they never disagree.
    ///
    /// Instants outside the nanosecond range (years before 1677 or after
    /// 2262) saturate.
    pub fn stamp(&mut self, time: DateTime<Utc>) {
        self.utime = time.timestamp_nanos_opt().unwrap_or(if time.timestamp() < 0 {
            i64::MIN
        } else {
            i64::MAX
        });
        self.time = time;
    }

    /// Rebuild the calendar time from a unix-nanosecond stamp.
    #[must_use]
    pub fn time_from_nanos(utime: i64) -> DateTime<Utc> {
        Utc.timestamp_nanos(utime)
    }

    /// Severity level of this message.
    #[must_use]
    pub fn severity(&self) -> Severity {
        Severity::from_priority(self.priority)
    }

    /// "Any tag matches" filter, see [`tags_match`].
    pub fn matches_tags<S: AsRef<str>>(&self, filter: &[S]) -> bool {
        tags_match(&self.tags, filter)
    }
}

/// Whether `tags` holds any tag in `filter`.
///
/// Empty strings in `filter` are ignored, so an empty filter or `[""]`
/// matches every tag set.
pub fn tags_match<T: AsRef<str>, S: AsRef<str>>(tags: &[T], filter: &[S]) -> bool {
    let mut wanted = filter
        .iter()
        .map(AsRef::as_ref)
        .filter(|t| !t.is_empty())
        .peekable();
    if wanted.peek().is_none() {
        return true;
    }
    wanted.any(|t| tags.iter().any(|have| have.as_ref() == t))
}
