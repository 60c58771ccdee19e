//! # Subsystem Container
//!
//! Configuration plus the running hub and archive, created at process start
//! and passed by reference to the boundaries.

pub mod config;
pub mod subsystems;

pub use config::{parse_log_keep, ConfigError, NodeConfig, DEFAULT_DB_ADDRESS, DEFAULT_LOG_KEEP};
pub use subsystems::SubsystemContainer;
