//! Request handlers
//!
//! Implementations of the gateway methods on top of [`crate::GatewayContext`].

pub mod confirmations;
pub mod tool_call;
