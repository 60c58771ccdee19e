//! # Query Boundary
//!
//! Validates query-string parameters and reads the archive directly.
//!
//! | Param | Default | Meaning |
//! |-------|---------|---------|
//! | `id` | | exact host match |
//! | `tag` | | repeated; any tag matches |
//! | `type` | configured log type | bucket |
//! | `start` | `0` | inclusive lower bound, unix nanos; `0` returns the newest entries |
//! | `end` | `0` | exclusive upper bound, unix nanos; `0` is unbounded |
//! | `limit` | `100` | maximum results |
//! | `level` | `TRACE` | least severe level returned |
//!
//! `start` and `end` accept `0x`, `0o`, `0b` and leading-zero octal forms;
//! `limit` is decimal.

use log_archive::{ArchiveApi, ArchiveEngine, ArchiveError, ArchiveQuery};
use shared_types::{Message, Severity};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Default result cap.
pub const DEFAULT_LIMIT: usize = 100;

/// Malformed query parameters, caught before the archive is called.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryParamError {
    #[error("bad start offset")]
    BadStart,

    #[error("bad end value")]
    BadEnd,

    #[error("bad limit")]
    BadLimit,

    #[error("bad level")]
    BadLevel,
}

/// Query failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error(transparent)]
    Params(#[from] QueryParamError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("failed to encode results: {0}")]
    Encode(String),
}

/// Parsed query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub host: String,
    pub tags: Vec<String>,
    pub log_type: String,
    pub start: i64,
    pub end: i64,
    pub limit: usize,
    pub level: Severity,
}

impl QueryParams {
    /// Parse `key=value` pairs. For single-valued keys the first
    /// occurrence wins; an empty value means the default.
    pub fn from_pairs<I, K, V>(pairs: I, default_type: &str) -> Result<Self, QueryParamError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut host = None;
        let mut log_type = None;
        let mut start = None;
        let mut end = None;
        let mut limit = None;
        let mut level = None;
        let mut tags = Vec::new();

        for (key, value) in pairs {
            let value = value.as_ref().to_string();
            let slot = match key.as_ref() {
                "id" => &mut host,
                "type" => &mut log_type,
                "start" => &mut start,
                "end" => &mut end,
                "limit" => &mut limit,
                "level" => &mut level,
                "tag" => {
                    tags.push(value);
                    continue;
                }
                _ => continue,
            };
            slot.get_or_insert(value);
        }

        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        Ok(Self {
            host: host.unwrap_or_default(),
            tags,
            log_type: non_empty(log_type).unwrap_or_else(|| default_type.to_string()),
            start: match non_empty(start) {
                Some(s) => parse_int(&s).ok_or(QueryParamError::BadStart)?,
                None => 0,
            },
            end: match non_empty(end) {
                Some(s) => parse_int(&s).ok_or(QueryParamError::BadEnd)?,
                None => 0,
            },
            limit: match non_empty(limit) {
                Some(s) => s.parse().map_err(|_| QueryParamError::BadLimit)?,
                None => DEFAULT_LIMIT,
            },
            level: match non_empty(level) {
                Some(s) => s.parse().map_err(|_| QueryParamError::BadLevel)?,
                None => Severity::Trace,
            },
        })
    }

    /// The archive query these parameters describe.
    #[must_use]
    pub fn to_archive_query(&self) -> ArchiveQuery {
        ArchiveQuery::new(self.log_type.clone())
            .host(self.host.clone())
            .tags(self.tags.iter().cloned())
            .range(self.start, self.end)
            .limit(self.limit)
            .min_severity(self.level)
    }
}

/// Parse a signed integer with an optional radix prefix.
fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, body) = match digits.get(..2) {
        Some("0x" | "0X") => (16, &digits[2..]),
        Some("0o" | "0O") => (8, &digits[2..]),
        Some("0b" | "0B") => (2, &digits[2..]),
        _ if digits.len() > 1 && digits.starts_with('0') => (8, &digits[1..]),
        _ => (10, digits),
    };
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }

    let magnitude = u64::from_str_radix(body, radix).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Serves queries straight from the archive.
pub struct QueryBoundary {
    archive: Arc<ArchiveEngine>,
    default_type: String,
}

impl QueryBoundary {
    pub fn new(archive: Arc<ArchiveEngine>, default_type: impl Into<String>) -> Self {
        Self {
            archive,
            default_type: default_type.into(),
        }
    }

    /// Validate `pairs` and run the query.
    pub fn query<I, K, V>(&self, pairs: I) -> Result<Vec<Message>, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params = QueryParams::from_pairs(pairs, &self.default_type)?;
        trace!(?params, "Archive query requested");
        Ok(self.archive.query(&params.to_archive_query())?)
    }

    /// Run the query and encode the results as a JSON array line.
    pub fn query_json<I, K, V>(&self, pairs: I) -> Result<Vec<u8>, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let messages = self.query(pairs)?;
        let mut body =
            serde_json::to_vec(&messages).map_err(|e| QueryError::Encode(e.to_string()))?;
        body.push(b'\n');
        Ok(body)
    }
}
