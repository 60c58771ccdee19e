//! Infrastructure Adapters
//!
//! Implementations of the `TimeSource` trait.

mod time;

pub use time::{ManualTimeSource, SystemTimeSource};
