//! # LogAgg Node Library
//!
//! The process layer around the hub and the archive. The `logagg` binary
//! in `main.rs` is a thin shell over this library.
//!
//! ## Modular Structure
//!
//! - `cli` - Flags and their `LOGAGG_*` environment variables
//! - `container/` - Configuration and the running subsystems
//! - `handlers/` - Ingest and query boundary shapes
//! - `runtime` - Startup and graceful shutdown
//! - `telemetry` - Service log setup

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod container;
pub mod handlers;
pub mod runtime;
pub mod telemetry;

pub use cli::Cli;
pub use container::{ConfigError, NodeConfig, SubsystemContainer};
pub use handlers::{IngestBoundary, QueryBoundary, QueryParams};
pub use runtime::NodeRuntime;
