//! # Adapters Module
//!
//! - `storage`: key-value engines and selection by address
//! - `serializer`: archived value codec
//! - `infra`: time sources

pub mod infra;
pub mod serializer;
pub mod storage;

pub use infra::{ManualTimeSource, SystemTimeSource};
pub use serializer::BincodeMessageSerializer;
pub use storage::{open_store, FileBackedKVStore, InMemoryKVStore};
#[cfg(feature = "rocksdb")]
pub use storage::{RocksDbConfig, RocksDbStore};
