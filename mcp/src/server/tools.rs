//! Tool definitions advertised by `tools/list`

use crate::remote::ToolSpec;
use cloudgate_guard::{ActionPolicyRegistry, BypassPolicy, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition as seen by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    pub input_schema: Value,

    /// Whether calls need a human confirmation
    pub dangerous: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Phrase to type back when confirming
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_confirmation: Option<String>,

    /// Set when the environment skips confirmation for this tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypassed: Option<bool>,
}

/// Annotate the remote API's tools with their confirmation policy.
pub fn get_all_tools(
    specs: Vec<ToolSpec>,
    registry: &ActionPolicyRegistry,
    bypass: &BypassPolicy,
    environment: Option<&str>,
) -> Vec<ToolDefinition> {
    let mut tools: Vec<ToolDefinition> = specs
        .into_iter()
        .map(|spec| {
            let policy = registry.lookup(&spec.name);
            let bypassed = policy.is_some() && bypass.is_bypass_environment(environment);

            let description = match policy {
                Some(policy) if !bypassed => format!(
                    "{} [requires confirmation: {} severity]",
                    spec.description, policy.severity
                ),
                _ => spec.description,
            };

            ToolDefinition {
                name: spec.name,
                description,
                input_schema: spec.input_schema,
                dangerous: policy.is_some(),
                severity: policy.map(|p| p.severity),
                category: policy.map(|p| p.category.clone()),
                required_confirmation: policy.map(|p| p.required_confirmation.clone()),
                bypassed: bypassed.then_some(true),
            }
        })
        .collect();

    tools.sort_by(|a, b| a.name.cmp(&b.name));
    tools
}
