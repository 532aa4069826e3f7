//! Confirmation management and policy listing

use crate::context::GatewayContext;
use crate::error::{McpError, Result};
use cloudgate_guard::{ConfirmationRequired, Severity};
use serde_json::{json, Value};
use tracing::info;

/// `confirmations/list`: live pending confirmations, store statistics and,
/// when kept, recent audit events.
pub async fn handle_list(ctx: &GatewayContext) -> Result<Value> {
    let pending: Vec<ConfirmationRequired> = ctx
        .guard
        .pending()
        .await
        .iter()
        .map(|p| ConfirmationRequired::from_request(&p.request))
        .collect();
    let stats = ctx.guard.stats().await;

    let mut result = json!({
        "pending": pending,
        "stats": stats,
    });

    if let Some(sink) = &ctx.recent_events {
        result["recentEvents"] = serde_json::to_value(sink.events())?;
    }

    Ok(result)
}

/// `confirmations/cancel`
pub async fn handle_cancel(ctx: &GatewayContext, params: Value) -> Result<Value> {
    let correlation_id = params["correlationId"]
        .as_str()
        .ok_or_else(|| McpError::InvalidParams("Missing 'correlationId' parameter".to_string()))?;

    let cancelled = ctx.guard.cancel(correlation_id).await;
    info!(correlation_id, cancelled, "Cancel requested");

    Ok(json!({
        "correlationId": correlation_id,
        "cancelled": cancelled,
    }))
}

/// `policies/list`, optionally filtered by `severity`.
pub async fn handle_policies(ctx: &GatewayContext, params: Value) -> Result<Value> {
    let severity = match params.get("severity") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_json::from_value::<Severity>(value.clone())
                .map_err(|e| McpError::InvalidParams(format!("Invalid severity: {}", e)))?,
        ),
    };

    let registry = ctx.guard.registry();
    let policies: Vec<Value> = registry
        .iter()
        .filter(|(_, policy)| severity.map_or(true, |s| policy.severity == s))
        .map(|(tool, policy)| {
            json!({
                "tool": tool,
                "severity": policy.severity,
                "category": policy.category,
                "description": policy.description,
                "warningMessage": policy.warning_message,
                "requiredConfirmation": policy.required_confirmation,
                "reversible": policy.reversible,
                "impactScope": policy.impact_scope,
            })
        })
        .collect();

    Ok(json!({
        "policies": policies,
        "count": policies.len(),
        "bypassEnvironments": ctx.guard.bypass().environments(),
    }))
}
