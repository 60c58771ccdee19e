//! # Integration Test Flows
//!
//! Each module drives a running [`NodeRuntime`](logagg_node::NodeRuntime)
//! or a hub plus archive pair the way the process wires them.

pub mod fanout;
pub mod pipeline;
pub mod retention;

#[cfg(test)]
pub(crate) mod support;
