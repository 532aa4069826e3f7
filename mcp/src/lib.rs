//! # Cloudgate gateway server
//!
//! JSON-RPC 2.0 tool server that sits between an automated agent and a cloud
//! management API. Every `tools/call` passes through the confirmation guard:
//! destructive tools are answered with a confirmation prompt and only run
//! once a human types the required phrase back.
//!
//! ## Architecture
//!
//! - **Protocol Layer**: JSON-RPC 2.0 types and line-delimited transport
//! - **Server Layer**: request routing and tool annotation
//! - **Handler Layer**: tool calls, confirmation management, policy listing
//! - **Remote Layer**: the [`RemoteResourceApi`] that confirmed calls reach
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cloudgate_guard::{ActionPolicyRegistry, ConfirmationGuard, GuardSettings, TracingAuditSink};
//! use cloudgate_mcp::{DryRunApi, GatewayContext, McpServer, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(ActionPolicyRegistry::builtin());
//!     let remote = Arc::new(DryRunApi::with_tool_names(
//!         registry.iter().map(|(tool, _)| tool.to_string()).collect::<Vec<_>>(),
//!     ));
//!     let guard = ConfirmationGuard::new(registry, GuardSettings::default(), Arc::new(TracingAuditSink));
//!
//!     let context = GatewayContext::new(Arc::new(guard), remote)
//!         .with_default_environment(Some("production".to_string()));
//!     McpServer::new(context, ServerConfig::default()).serve_stdio().await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod remote;
pub mod server;

// Re-export main types
pub use context::GatewayContext;
pub use error::{McpError, Result};
pub use protocol::{JsonRpcRequest, JsonRpcResponse, LineTransport, StdioTransport};
pub use remote::{DryRunApi, RemoteError, RemoteResourceApi, ToolSpec};
pub use server::{McpServer, ServerConfig, ToolDefinition};
