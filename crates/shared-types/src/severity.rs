//! # Severity Scale
//!
//! Ordered log levels. Lower numeric values are more severe, so
//! `Fatal < Error < Warn < Info < Debug < Trace` both numerically and by `Ord`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A log level, stored on a [`Message`](crate::Message) as its `priority`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Severity {
    Fatal = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    #[default]
    Trace = 5,
}

/// Level name that is not part of the scale.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown severity level '{0}' (expected fatal, error, warn, info, debug or trace)")]
pub struct SeverityParseError(pub String);

impl Severity {
    /// Every level, most severe first.
    pub const ALL: [Severity; 6] = [
        Severity::Fatal,
        Severity::Error,
        Severity::Warn,
        Severity::Info,
        Severity::Debug,
        Severity::Trace,
    ];

    /// Numeric priority of this level.
    #[must_use]
    pub fn as_priority(self) -> u8 {
        self as u8
    }

    /// Map a raw priority onto the scale. Anything past `Trace` is `Trace`.
    #[must_use]
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            0 => Severity::Fatal,
            1 => Severity::Error,
            2 => Severity::Warn,
            3 => Severity::Info,
            4 => Severity::Debug,
            _ => Severity::Trace,
        }
    }

    /// Whether a message with `priority` is at least as severe as `self`.
    ///
    /// Used as a minimum-severity filter: `Severity::Warn.includes(1)` holds,
    /// `Severity::Warn.includes(3)` does not. Priorities past the scale count
    /// as `Trace`, the same way [`Severity::from_priority`] reads them.
    #[must_use]
    pub fn includes(self, priority: u8) -> bool {
        Severity::from_priority(priority) <= self
    }

    /// Lowercase level name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = SeverityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(Severity::Fatal),
            "error" => Ok(Severity::Error),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "debug" => Ok(Severity::Debug),
            "trace" => Ok(Severity::Trace),
            _ => Err(SeverityParseError(s.to_string())),
        }
    }
}
