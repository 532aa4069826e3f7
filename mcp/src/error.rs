//! Error types for the gateway server

use crate::protocol::JsonRpcError;
use crate::remote::RemoteError;
use cloudgate_guard::GuardError;
use serde_json::{json, Value};
use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, McpError>;

/// Gateway server errors
#[derive(Debug, Error)]
pub enum McpError {
    /// Protocol error (invalid JSON-RPC)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Tool not offered by the remote API
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Confirmation protocol outcome or guard failure
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// Remote API failure
    #[error("Remote API error: {0}")]
    Remote(#[from] RemoteError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Convert to JSON-RPC error
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        match self {
            McpError::Protocol(msg) => JsonRpcError::invalid_request(msg),
            McpError::MethodNotFound(method) => JsonRpcError::method_not_found(method),
            McpError::InvalidParams(msg) => JsonRpcError::invalid_params(msg),
            McpError::UnknownTool(tool) => JsonRpcError::tool_not_found(tool),
            McpError::Guard(e) => guard_to_jsonrpc(e),
            McpError::Remote(RemoteError::UnknownCommand(tool)) => {
                JsonRpcError::tool_not_found(tool)
            }
            McpError::Remote(RemoteError::InvalidArguments(msg)) => {
                JsonRpcError::invalid_params(msg)
            }
            McpError::Remote(e) => JsonRpcError::remote_failed(e.to_string()),
            McpError::Io(e) => JsonRpcError::internal_error(e.to_string()),
            McpError::Json(e) => JsonRpcError::invalid_params(e.to_string()),
            McpError::Internal(msg) => JsonRpcError::internal_error(msg),
        }
    }
}

fn guard_to_jsonrpc(error: &GuardError) -> JsonRpcError {
    match error {
        GuardError::ConfirmationRequired(payload) => {
            let data = serde_json::to_value(payload.as_ref()).unwrap_or(Value::Null);
            JsonRpcError::confirmation(payload.code, payload.title.clone(), data)
        }
        GuardError::Capacity { max_pending } => JsonRpcError::confirmation_capacity(*max_pending),
        GuardError::MalformedResponse(msg) => {
            JsonRpcError::invalid_params(format!("malformed confirmation: {}", msg))
        }
        other => match other.code() {
            Some(code) => {
                let data = other
                    .context()
                    .and_then(|ctx| serde_json::to_value(ctx).ok())
                    .unwrap_or_else(|| json!({}));
                JsonRpcError::confirmation(code, other.to_string(), data)
            }
            None => JsonRpcError::internal_error(other.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudgate_guard::{RejectionContext, Severity};

    fn context() -> Box<RejectionContext> {
        Box::new(RejectionContext {
            tool_name: "destroy_virtual_machine".to_string(),
            category: "Virtual Machine Operations".to_string(),
            severity: Severity::Critical,
            required_confirmation: "destroy permanently".to_string(),
        })
    }

    #[test]
    fn test_error_to_jsonrpc() {
        let err = McpError::MethodNotFound("test".to_string());
        assert_eq!(err.to_jsonrpc().code, -32601);

        let err = McpError::UnknownTool("nope".to_string());
        assert_eq!(err.to_jsonrpc().code, -32001);
    }

    #[test]
    fn test_rejections_carry_policy_context() {
        let err = McpError::from(GuardError::InvalidText(context()));
        let rpc = err.to_jsonrpc();
        assert_eq!(rpc.code, -32012);

        let data = rpc.data.unwrap();
        assert_eq!(data["code"], "CONFIRMATION_INVALID");
        assert_eq!(data["severity"], "critical");
        assert_eq!(data["requiredConfirmation"], "destroy permanently");

        let rpc = McpError::from(GuardError::Denied(context())).to_jsonrpc();
        assert_eq!(rpc.code, -32013);
        assert_eq!(rpc.message, "Operation cancelled by user");
    }

    #[test]
    fn test_expired_is_generic() {
        let rpc = McpError::from(GuardError::Expired).to_jsonrpc();
        assert_eq!(rpc.code, -32014);
        assert_eq!(rpc.message, "Confirmation request is invalid or expired");
        let data = rpc.data.unwrap();
        assert_eq!(data, json!({"code": "CONFIRMATION_EXPIRED"}));
    }

    #[test]
    fn test_capacity_and_malformed() {
        let rpc = McpError::from(GuardError::Capacity { max_pending: 3 }).to_jsonrpc();
        assert_eq!(rpc.code, -32015);
        assert_eq!(rpc.data.unwrap()["maxPending"], 3);

        let rpc = McpError::from(GuardError::MalformedResponse("x".to_string())).to_jsonrpc();
        assert_eq!(rpc.code, -32602);
    }
}
