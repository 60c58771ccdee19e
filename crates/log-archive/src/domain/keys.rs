//! # Entry Keys
//!
//! ```text
//! ┌────────────────────────┬────────────────────────┐
//! │ time_nanos: u64 (BE)   │ sequence: u64 (BE)     │   16 bytes
//! └────────────────────────┴────────────────────────┘
//! ```
//!
//! Big-endian encoding makes byte order equal `(time, sequence)` order, so an
//! ordered scan over a bucket yields archive order.

use crate::domain::errors::KVStoreError;

/// Encoded key length.
pub const KEY_LEN: usize = 16;

/// Position of one archived message within its bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    /// Archive time in unix nanoseconds.
    pub time: u64,
    /// Disambiguator among entries sharing `time`.
    pub sequence: u64,
}

impl EntryKey {
    #[must_use]
    pub fn new(time: u64, sequence: u64) -> Self {
        Self { time, sequence }
    }

    /// Smallest key at or after `utime`. Negative instants clamp to 0.
    #[must_use]
    pub fn lower_bound(utime: i64) -> Self {
        Self::new(clamp_nanos(utime), 0)
    }

    #[must_use]
    pub fn encode(&self) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        key[..8].copy_from_slice(&self.time.to_be_bytes());
        key[8..].copy_from_slice(&self.sequence.to_be_bytes());
        key
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, KVStoreError> {
        let raw: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            KVStoreError::corruption(format!(
                "entry key has {} bytes, expected {}",
                bytes.len(),
                KEY_LEN
            ))
        })?;
        let (time, sequence) = raw.split_at(8);
        Ok(Self {
            time: u64::from_be_bytes(time.try_into().unwrap_or_default()),
            sequence: u64::from_be_bytes(sequence.try_into().unwrap_or_default()),
        })
    }

    /// The key a message stamped `utime` gets when `self` is the bucket's
    /// newest key. Always strictly greater than `self`.
    #[must_use]
    pub fn successor(&self, utime: i64) -> Self {
        let time = clamp_nanos(utime);
        if time > self.time {
            return Self::new(time, 0);
        }
        match self.sequence.checked_add(1) {
            Some(sequence) => Self::new(self.time, sequence),
            None => Self::new(self.time.saturating_add(1), 0),
        }
    }

    /// Archive time as signed unix nanoseconds.
    #[must_use]
    pub fn utime(&self) -> i64 {
        i64::try_from(self.time).unwrap_or(i64::MAX)
    }
}

fn clamp_nanos(utime: i64) -> u64 {
    u64::try_from(utime).unwrap_or(0)
}

/// Key allocator for one bucket.
///
/// Keys come out strictly increasing in call order, even when timestamps
/// collide or go backwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyClock {
    newest: Option<EntryKey>,
}

impl KeyClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock resuming after the bucket's newest stored key.
    #[must_use]
    pub fn resume_after(newest: Option<EntryKey>) -> Self {
        Self { newest }
    }

    /// Allocate the key for a message stamped `utime`.
    pub fn next(&mut self, utime: i64) -> EntryKey {
        let key = match self.newest {
            Some(newest) => newest.successor(utime),
            None => EntryKey::lower_bound(utime),
        };
        self.newest = Some(key);
        key
    }

    /// Newest key handed out or resumed from.
    #[must_use]
    pub fn newest(&self) -> Option<EntryKey> {
        self.newest
    }
}
