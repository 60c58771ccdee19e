//! # LogAgg Test Suite
//!
//! Unified test crate for flows that cross crate boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── pipeline_benchmarks.rs   # publish and archive throughput
//! └── src/integration/
//!     ├── pipeline.rs              # ingest → hub → archive → query
//!     ├── retention.rs             # expiry through the running node
//!     └── fanout.rs                # hub outputs alongside the archive
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p logagg-tests
//! cargo test -p logagg-tests integration::retention
//! cargo bench -p logagg-tests
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod integration;
