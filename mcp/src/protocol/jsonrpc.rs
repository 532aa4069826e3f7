//! JSON-RPC 2.0 protocol types
//!
//! Envelopes for the gateway's requests and responses, and the error codes
//! confirmation outcomes are reported under.

use cloudgate_guard::OutcomeCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version (must be "2.0")
    pub jsonrpc: String,

    /// Request ID (may be null for notifications)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Check if this is a notification
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version (must be "2.0")
    pub jsonrpc: String,

    /// Request ID (same as request, or null for error before ID was extracted)
    pub id: Option<RequestId>,

    /// Result (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,

    /// Error message
    pub message: String,

    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// -32700, for lines that are not JSON
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    /// -32600
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, format!("Invalid request: {}", msg.into()))
    }

    /// -32601
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    /// -32602, also used for malformed confirmation answers
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, format!("Invalid params: {}", msg.into()))
    }

    /// -32603
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, format!("Internal error: {}", msg.into()))
    }

    // Gateway errors

    /// Tool not found (-32001)
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::with_data(
            -32001,
            "Tool not found",
            serde_json::json!({"tool": tool.into()}),
        )
    }

    /// Remote API call failed (-32002)
    pub fn remote_failed(details: impl Into<String>) -> Self {
        Self::with_data(
            -32002,
            "Remote API call failed",
            serde_json::json!({"details": details.into()}),
        )
    }

    /// Confirmation protocol outcome (-32010 to -32014). `data` carries the
    /// outcome code string plus whatever context the guard had.
    pub fn confirmation(code: OutcomeCode, message: impl Into<String>, data: Value) -> Self {
        let mut data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("details".to_string(), other);
                map
            }
        };
        data.insert("code".to_string(), Value::String(code.as_str().to_string()));
        Self::with_data(confirmation_code(code), message, Value::Object(data))
    }

    /// Too many pending confirmations (-32015)
    pub fn confirmation_capacity(max_pending: usize) -> Self {
        Self::with_data(
            -32015,
            "Too many pending confirmations",
            serde_json::json!({"maxPending": max_pending}),
        )
    }
}

fn confirmation_code(code: OutcomeCode) -> i32 {
    match code {
        OutcomeCode::ConfirmationRequired => -32010,
        OutcomeCode::ConfirmationTimeout => -32011,
        OutcomeCode::ConfirmationInvalid => -32012,
        OutcomeCode::ConfirmationDenied => -32013,
        OutcomeCode::ConfirmationExpired => -32014,
    }
}

/// Request/Response ID (can be string or number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String ID
    String(String),
    /// Numeric ID
    Number(i64),
}
