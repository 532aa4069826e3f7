//! Gateway server
//!
//! Routes JSON-RPC requests to the handlers.

pub mod tools;

use crate::context::GatewayContext;
use crate::error::{McpError, Result};
use crate::handlers::{confirmations, tool_call};
use crate::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, LineTransport, RequestId, StdioTransport,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, error, info, warn};

pub use tools::ToolDefinition;

/// Gateway server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name
    pub name: String,

    /// Server version
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "cloudgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// JSON-RPC gateway server
pub struct McpServer {
    context: Arc<GatewayContext>,
    config: ServerConfig,
}

impl McpServer {
    pub fn new(context: GatewayContext, config: ServerConfig) -> Self {
        info!(
            server = config.name,
            version = config.version,
            default_environment = ?context.default_environment,
            "Gateway server initialized"
        );

        Self {
            context: Arc::new(context),
            config,
        }
    }

    pub fn context(&self) -> &GatewayContext {
        &self.context
    }

    /// Serve requests over stdio
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("Gateway listening on stdio");
        self.serve(StdioTransport::stdio()).await
    }

    /// Serve requests until the peer closes the stream. Pending
    /// confirmations are discarded on the way out.
    pub async fn serve<R, W>(&self, mut transport: LineTransport<R, W>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let request = match transport.read_request().await {
                Ok(Some(req)) => req,
                Ok(None) => {
                    info!("Client disconnected");
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    error!(error = %e, "Failed to read request");
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    transport.write_response(&response).await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let is_notification = request.is_notification();
            let response = self.handle_request(request).await;

            if !is_notification {
                transport.write_response(&response).await?;
            }
        }

        let discarded = self.context.guard.shutdown().await;
        if discarded > 0 {
            info!(discarded, "Discarded pending confirmations on shutdown");
        }

        transport.close().await?;
        Ok(())
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        if request.jsonrpc != "2.0" {
            let error = McpError::Protocol(format!("unsupported version '{}'", request.jsonrpc));
            return JsonRpcResponse::error(id, error.to_jsonrpc());
        }

        let params = request.params.unwrap_or_else(|| json!({}));
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(params).await,
            "notifications/initialized" | "initialized" => Ok(Value::Null),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(params).await,
            "tools/call" => tool_call::handle_call(&self.context, params).await,
            "confirmations/list" => confirmations::handle_list(&self.context).await,
            "confirmations/cancel" => confirmations::handle_cancel(&self.context, params).await,
            "policies/list" => confirmations::handle_policies(&self.context, params).await,
            _ => Err(McpError::MethodNotFound(request.method.clone())),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id.unwrap_or(RequestId::Number(0)), value),
            Err(McpError::Guard(e)) if e.code().is_some() => {
                // Protocol outcomes are expected traffic, not failures
                debug!(method = %request.method, outcome = ?e.code(), "Confirmation outcome");
                JsonRpcResponse::error(id, McpError::Guard(e).to_jsonrpc())
            }
            Err(e) => {
                warn!(method = %request.method, error = %e, "Request failed");
                JsonRpcResponse::error(id, e.to_jsonrpc())
            }
        }
    }

    async fn handle_initialize(&self, params: Value) -> Result<Value> {
        info!(client = ?params.get("clientInfo"), "Received initialize request");

        let guard = &self.context.guard;
        Ok(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.config.name,
                "version": self.config.version
            },
            "confirmation": {
                "guardedTools": guard.registry().len(),
                "bypassEnvironments": guard.bypass().environments(),
                "defaultEnvironment": self.context.default_environment
            }
        }))
    }

    async fn handle_tools_list(&self, params: Value) -> Result<Value> {
        let requested = params["environment"].as_str();
        let environment = self.context.environment(requested);

        let tools = tools::get_all_tools(
            self.context.remote.tools(),
            self.context.guard.registry(),
            self.context.guard.bypass(),
            environment,
        );

        Ok(json!({
            "tools": tools
        }))
    }
}
