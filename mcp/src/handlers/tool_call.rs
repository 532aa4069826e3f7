//! `tools/call` handler
//!
//! First call: the guard decides whether the tool runs right away or has to
//! be confirmed. Second call (with a `confirmation` object): the pending
//! request is resolved and, if accepted, executed with the parameters stored
//! on the first call.

use crate::context::GatewayContext;
use crate::error::{McpError, Result};
use cloudgate_guard::{Gate, GuardError};
use serde_json::{json, Map, Value};
use tracing::info;

pub async fn handle_call(ctx: &GatewayContext, params: Value) -> Result<Value> {
    let tool = params["name"]
        .as_str()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| McpError::InvalidParams("Missing tool name".to_string()))?;

    if !ctx.remote.tools().iter().any(|spec| spec.name == tool) {
        return Err(McpError::UnknownTool(tool.to_string()));
    }

    match params.get("confirmation") {
        Some(confirmation) if !confirmation.is_null() => {
            execute_confirmed(ctx, tool, confirmation).await
        }
        _ => {
            let arguments = arguments(&params)?;
            let environment = match params.get("environment") {
                None | Some(Value::Null) => None,
                Some(Value::String(env)) => Some(env.as_str()),
                Some(_) => {
                    return Err(McpError::InvalidParams(
                        "'environment' must be a string".to_string(),
                    ))
                }
            };
            begin(ctx, tool, arguments, ctx.environment(environment)).await
        }
    }
}

async fn begin(
    ctx: &GatewayContext,
    tool: &str,
    arguments: Map<String, Value>,
    environment: Option<&str>,
) -> Result<Value> {
    match ctx.guard.begin(tool, arguments, environment).await? {
        Gate::Proceed(arguments) => {
            info!(tool, "Calling tool");
            let result = ctx.remote.call(tool, &arguments).await?;
            Ok(tool_result(result))
        }
        Gate::ConfirmationRequired(payload) => {
            Err(GuardError::ConfirmationRequired(payload).into())
        }
    }
}

async fn execute_confirmed(ctx: &GatewayContext, tool: &str, confirmation: &Value) -> Result<Value> {
    let action = ctx.guard.confirm_value(tool, confirmation).await?;

    info!(
        tool,
        correlation_id = %action.request.correlation_id,
        "Executing confirmed call"
    );

    let result = ctx.remote.call(action.tool_name(), action.parameters()).await?;
    let mut response = tool_result(result);
    response["confirmation"] = json!({
        "correlationId": action.request.correlation_id,
        "status": "confirmed",
    });
    Ok(response)
}

fn arguments(params: &Value) -> Result<Map<String, Value>> {
    match params.get("arguments") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(McpError::InvalidParams(
            "'arguments' must be an object".to_string(),
        )),
    }
}

fn tool_result(result: Value) -> Value {
    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
    json!({
        "content": [{"type": "text", "text": text}],
        "structuredContent": result,
        "isError": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::DryRunApi;
    use cloudgate_guard::{ActionPolicyRegistry, ConfirmationGuard, GuardSettings, TracingAuditSink};
    use std::sync::Arc;

    fn context() -> GatewayContext {
        let guard = ConfirmationGuard::new(
            Arc::new(ActionPolicyRegistry::builtin()),
            GuardSettings::default(),
            Arc::new(TracingAuditSink),
        );
        GatewayContext::new(
            Arc::new(guard),
            Arc::new(DryRunApi::with_tool_names([
                "list_instances",
                "delete_snapshot",
            ])),
        )
    }

    #[tokio::test]
    async fn test_unguarded_call_executes() {
        let ctx = context();
        let result = handle_call(
            &ctx,
            json!({"name": "list_instances", "arguments": {"per_page": 5}}),
        )
        .await
        .unwrap();
        assert_eq!(result["structuredContent"]["parameters"]["per_page"], 5);
        assert_eq!(result["isError"], false);
    }

    #[tokio::test]
    async fn test_missing_and_unknown_tool() {
        let ctx = context();
        let err = handle_call(&ctx, json!({"arguments": {}})).await.unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));

        let err = handle_call(&ctx, json!({"name": "format_disk"}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::UnknownTool(t) if t == "format_disk"));
    }

    #[tokio::test]
    async fn test_bad_argument_shapes() {
        let ctx = context();
        let err = handle_call(&ctx, json!({"name": "list_instances", "arguments": [1]}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));

        let err = handle_call(&ctx, json!({"name": "list_instances", "environment": 3}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_confirmed_call_uses_stored_arguments() {
        let ctx = context().with_default_environment(Some("production".to_string()));

        let err = handle_call(
            &ctx,
            json!({"name": "delete_snapshot", "arguments": {"id": "snap-1"}}),
        )
        .await
        .unwrap_err();
        let correlation_id = match err {
            McpError::Guard(GuardError::ConfirmationRequired(payload)) => payload.correlation_id,
            other => panic!("expected confirmation prompt, got {:?}", other),
        };

        let result = handle_call(
            &ctx,
            json!({
                "name": "delete_snapshot",
                "arguments": {"id": "snap-OTHER"},
                "confirmation": {
                    "correlationId": correlation_id,
                    "confirmed": true,
                    "userInput": "Delete Snapshot",
                    "timestamp": 0
                }
            }),
        )
        .await
        .unwrap();

        assert_eq!(result["structuredContent"]["parameters"]["id"], "snap-1");
        assert_eq!(result["confirmation"]["status"], "confirmed");
    }
}
