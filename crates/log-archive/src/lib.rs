//! # Log Archive
//!
//! Durable per-type storage of log messages, fed by the broadcast hub and
//! read directly by the query boundary.
//!
//! ```text
//! BroadcastHub ──"archive"──► write ──► bucket(type) ◄── query(type, filters)
//!                                           ▲
//!                         expiry loop ──────┘ prune per retention rule
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Ordered keys | Entry keys strictly increase per bucket in write order |
//! | Atomic prune | Each bucket prune is one batch |
//! | Closed is final | Every operation after close fails with `Closed` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Keys, retention grammar, store addresses, errors
//! - `ports/` - `ArchiveApi` (inbound), `KeyValueStore` and friends (outbound)
//! - `adapters/` - Memory, file journal and RocksDB stores; bincode codec
//! - `service/` - The `ArchiveEngine`
//!
//! ## Usage
//!
//! ```ignore
//! use log_archive::{ArchiveApi, ArchiveConfig, ArchiveEngine, ArchiveQuery};
//!
//! let engine = ArchiveEngine::init(ArchiveConfig::default(), hub.clone()).await?;
//! hub.publish(Message::new("app", "started")).await;
//! let recent = engine.query(&ArchiveQuery::new("app").limit(10))?;
//! engine.close().await?;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use domain::address::{EngineKind, StoreAddress};
pub use domain::entities::{ArchiveQuery, ArchiveStats, ExpiryReport, StoredMessage};
pub use domain::errors::{AddressError, ArchiveError, KVStoreError, RetentionError, SerializationError};
pub use domain::keys::{EntryKey, KeyClock};
pub use domain::retention::{RetentionPolicy, RetentionRule};
pub use ports::inbound::ArchiveApi;
pub use ports::outbound::{
    BatchOperation, KeyRange, KeyValueStore, MessageSerializer, ScanDirection, TimeSource,
};
pub use service::{
    ArchiveConfig, ArchiveDependencies, ArchiveEngine, ARCHIVE_TAG, DEFAULT_EXPIRY_INTERVAL,
};
