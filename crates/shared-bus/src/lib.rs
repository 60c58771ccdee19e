//! # Shared Bus - Broadcast Hub for Log Messages
//!
//! Producers publish [`Message`](shared_types::Message)s; every registered
//! output receives each message once, in publish order.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Ingestion   │                    │   Archive    │
//! │              │    publish()       │   (output)   │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │ BroadcastHub │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe(tag, fn)
//! ```
//!
//! ## Guarantees
//!
//! - **Per-output ordering:** one worker per output, fed by a bounded queue.
//! - **Backpressure:** a full queue makes `publish` wait rather than drop.
//! - **Clean unsubscribe:** accepted messages are drained before the worker
//!   exits; a publisher blocked on a removed output is released.
//! - **Isolation:** a panicking output is counted and logged, never fatal.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use publisher::{BroadcastHub, HubConfig, MessagePublisher};
pub use subscriber::{HubError, OutputFn};

/// Maximum messages buffered per output before `publish` waits.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_QUEUE_CAPACITY, 1000);
        assert_eq!(HubConfig::default().queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }
}
