//! # Boundary Handlers
//!
//! Transport-neutral shapes of the ingest and query endpoints.

pub mod ingest;
pub mod query;

pub use ingest::{IngestBoundary, IngestError, RAW_PRIORITY, RAW_TAG};
pub use query::{QueryBoundary, QueryError, QueryParamError, QueryParams, DEFAULT_LIMIT};
