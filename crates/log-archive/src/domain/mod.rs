//! # Domain Layer
//!
//! Pure archive logic: key layout, retention grammar, store addressing.

pub mod address;
pub mod entities;
pub mod errors;
pub mod keys;
pub mod retention;
