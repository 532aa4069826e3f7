//! Remote resource API seam
//!
//! The gateway never talks to a cloud provider itself. Calls that clear the
//! confirmation guard are handed to a [`RemoteResourceApi`] implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

/// Remote API errors
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Remote API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

/// A command the remote API offers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,

    /// JSON Schema of the arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Executes commands against the managed cloud
#[async_trait]
pub trait RemoteResourceApi: Send + Sync {
    /// Execute `command` with `params`.
    async fn call(
        &self,
        command: &str,
        params: &Map<String, Value>,
    ) -> std::result::Result<Value, RemoteError>;

    /// Commands this API offers.
    fn tools(&self) -> Vec<ToolSpec>;
}

/// Remote API that performs nothing and echoes each call back.
pub struct DryRunApi {
    tools: BTreeMap<String, ToolSpec>,
}

impl DryRunApi {
    pub fn new(tools: impl IntoIterator<Item = ToolSpec>) -> Self {
        Self {
            tools: tools.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Offer every named tool with a permissive schema.
    pub fn with_tool_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(names.into_iter().map(|name| {
            let name = name.as_ref();
            ToolSpec::new(
                name,
                format!("{} (dry run)", name.replace('_', " ")),
                json!({"type": "object", "additionalProperties": true}),
            )
        }))
    }
}

#[async_trait]
impl RemoteResourceApi for DryRunApi {
    async fn call(
        &self,
        command: &str,
        params: &Map<String, Value>,
    ) -> std::result::Result<Value, RemoteError> {
        if !self.tools.contains_key(command) {
            return Err(RemoteError::UnknownCommand(command.to_string()));
        }

        info!(command, "Dry run: command not sent to the remote API");

        Ok(json!({
            "dryRun": true,
            "command": command,
            "parameters": params,
            "executedAt": Utc::now().to_rfc3339(),
        }))
    }

    fn tools(&self) -> Vec<ToolSpec> {
        self.tools.values().cloned().collect()
    }
}
