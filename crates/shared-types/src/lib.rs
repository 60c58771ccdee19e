//! # Shared Types Crate
//!
//! The data model that flows through the whole service.
//!
//! ## Design Principles
//!
//! - **Immutable once published**: a [`Message`] is built and stamped at the
//!   ingestion boundary, then only cloned.
//! - **Two keys always present**: `log_type` selects the archive bucket and
//!   `utime` orders entries inside it. Both are populated before a message
//!   reaches the hub.
//! - **Closed severity scale**: [`Severity`] is a fixed, totally ordered
//!   enumeration; unknown level names are rejected, never defaulted.

pub mod message;
pub mod severity;

pub use message::{tags_match, Message};
pub use severity::{Severity, SeverityParseError};
