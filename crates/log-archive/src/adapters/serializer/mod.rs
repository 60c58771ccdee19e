//! Serializer Adapters
//!
//! Implementations of the `MessageSerializer` trait.

mod bincode;

pub use self::bincode::BincodeMessageSerializer;
