//! JSON-RPC protocol implementation
//!
//! Core protocol types and the line-delimited transport the gateway speaks.

pub mod jsonrpc;
pub mod transport;

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use transport::{LineTransport, StdioTransport};
