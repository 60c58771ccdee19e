//! # Ports Layer
//!
//! - `inbound.rs` - Driving ports (API exposed to the node)
//! - `outbound.rs` - Driven ports (dependencies required by the engine)

pub mod inbound;
pub mod outbound;
