//! # Retention Policy
//!
//! Parses the per-type retention mapping into rules consulted by the expiry
//! pass.
//!
//! ## Grammar
//!
//! | Value | Rule |
//! |-------|------|
//! | `""` | unbounded |
//! | `N` (digits) | keep the N most recent entries, `0` keeps nothing |
//! | `N` + unit | delete entries older than N units, `0s` keeps nothing |
//!
//! Units: `s`econds, `m`inutes, `h`ours, `d`ays, `w`eeks, `y`ears (365 days).

use crate::domain::errors::RetentionError;
use std::collections::HashMap;
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const YEAR: u64 = 365 * DAY;

/// What an expiry pass deletes from one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionRule {
    /// Never prune.
    Unbounded,
    /// Delete entries older than `now - duration`.
    MaxAge(Duration),
    /// Keep only the most recent N entries.
    MaxCount(u64),
    /// Delete everything on every pass.
    Immediate,
}

impl RetentionRule {
    /// Parse one policy value.
    ///
    /// Returns the reason on failure; [`RetentionPolicy::parse`] attaches the
    /// log type and value.
    pub fn parse(value: &str) -> Result<Self, &'static str> {
        if value.is_empty() {
            return Ok(RetentionRule::Unbounded);
        }

        let digits_end = value
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(value.len());
        let (digits, unit) = value.split_at(digits_end);
        if digits.is_empty() {
            return Err("expected a number");
        }
        let amount: u64 = digits.parse().map_err(|_| "number out of range")?;

        let seconds_per_unit = match unit {
            "" => {
                return Ok(match amount {
                    0 => RetentionRule::Immediate,
                    n => RetentionRule::MaxCount(n),
                });
            }
            "s" => 1,
            "m" => MINUTE,
            "h" => HOUR,
            "d" => DAY,
            "w" => WEEK,
            "y" => YEAR,
            _ => return Err("unknown unit, expected one of s, m, h, d, w, y"),
        };

        let seconds = amount
            .checked_mul(seconds_per_unit)
            .ok_or("duration out of range")?;
        // Ages are compared in unix nanoseconds.
        if seconds > (i64::MAX as u64) / 1_000_000_000 {
            return Err("duration out of range");
        }

        Ok(match seconds {
            0 => RetentionRule::Immediate,
            s => RetentionRule::MaxAge(Duration::from_secs(s)),
        })
    }
}

/// Immutable mapping from log type to [`RetentionRule`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    rules: HashMap<String, RetentionRule>,
}

impl RetentionPolicy {
    /// Build a policy from `type -> policy string`.
    ///
    /// The first malformed entry fails the whole policy.
    pub fn parse<K, V, I>(entries: I) -> Result<Self, RetentionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut rules = HashMap::new();
        for (log_type, value) in entries {
            let (log_type, value) = (log_type.as_ref(), value.as_ref());
            let rule = RetentionRule::parse(value).map_err(|reason| {
                RetentionError::InvalidPolicy {
                    log_type: log_type.to_string(),
                    value: value.to_string(),
                    reason,
                }
            })?;
            rules.insert(log_type.to_string(), rule);
        }
        Ok(Self { rules })
    }

    /// Rule for `log_type`; types without an entry are unbounded.
    #[must_use]
    pub fn rule(&self, log_type: &str) -> RetentionRule {
        self.rules
            .get(log_type)
            .copied()
            .unwrap_or(RetentionRule::Unbounded)
    }

    /// Types that an expiry pass has to visit, sorted.
    #[must_use]
    pub fn prunable_types(&self) -> Vec<(&str, RetentionRule)> {
        let mut types: Vec<_> = self
            .rules
            .iter()
            .filter(|(_, rule)| **rule != RetentionRule::Unbounded)
            .map(|(t, rule)| (t.as_str(), *rule))
            .collect();
        types.sort_by(|a, b| a.0.cmp(b.0));
        types
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
