//! Wire-level shapes of the confirmation protocol
//!
//! A guarded call that has not been confirmed yet produces a
//! [`ConfirmationRequired`] payload. The caller answers with a
//! [`ConfirmationResponse`] carrying the same correlation id.

use crate::error::{GuardError, Result};
use crate::policy::{ImpactScope, Severity};
use crate::request::ConfirmationRequest;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fmt::Write as _;

/// Outcome codes callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeCode {
    ConfirmationRequired,
    ConfirmationTimeout,
    ConfirmationInvalid,
    ConfirmationDenied,
    ConfirmationExpired,
}

impl OutcomeCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCode::ConfirmationRequired => "CONFIRMATION_REQUIRED",
            OutcomeCode::ConfirmationTimeout => "CONFIRMATION_TIMEOUT",
            OutcomeCode::ConfirmationInvalid => "CONFIRMATION_INVALID",
            OutcomeCode::ConfirmationDenied => "CONFIRMATION_DENIED",
            OutcomeCode::ConfirmationExpired => "CONFIRMATION_EXPIRED",
        }
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification block of a confirmation prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDetails {
    pub category: String,
    pub severity: Severity,
    pub reversible: bool,
    pub impact_scope: ImpactScope,
}

/// Returned instead of executing a guarded operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequired {
    pub code: OutcomeCode,
    pub correlation_id: String,
    pub tool_name: String,
    pub title: String,
    pub description: String,
    pub warning_message: String,
    pub confirmation_instructions: String,
    pub required_confirmation: String,
    pub action_details: ActionDetails,

    /// Sanitized invocation parameters
    pub parameters: Map<String, Value>,

    /// Expiry as epoch milliseconds
    pub expires_at: i64,

    /// The prompt rendered for a human, see [`format_for_display`]
    #[serde(default)]
    pub display: String,
}

impl ConfirmationRequired {
    /// Encode a pending request for the caller.
    pub fn from_request(request: &ConfirmationRequest) -> Self {
        let policy = &request.policy;
        Self {
            code: OutcomeCode::ConfirmationRequired,
            correlation_id: request.correlation_id.clone(),
            tool_name: request.tool_name.clone(),
            title: policy.title(),
            description: policy.description.clone(),
            warning_message: policy.warning_message.clone(),
            confirmation_instructions: instructions(&policy.required_confirmation),
            required_confirmation: policy.required_confirmation.clone(),
            action_details: ActionDetails {
                category: policy.category.clone(),
                severity: policy.severity,
                reversible: policy.reversible,
                impact_scope: policy.impact_scope,
            },
            parameters: request.sanitized_parameters().clone(),
            expires_at: request.expires_at.timestamp_millis(),
            display: format_for_display(request),
        }
    }
}

fn instructions(phrase: &str) -> String {
    format!(
        "To proceed, call the same tool again with a confirmation object containing \
         this correlationId, confirmed: true and userInput: \"{}\" (case-insensitive).",
        phrase
    )
}

/// Caller's answer to a [`ConfirmationRequired`] prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationResponse {
    pub correlation_id: String,
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,

    /// Epoch milliseconds
    pub timestamp: i64,
}

impl ConfirmationResponse {
    /// A confirmation answer stamped with the current time.
    pub fn new(
        correlation_id: impl Into<String>,
        confirmed: bool,
        user_input: Option<&str>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            confirmed,
            user_input: user_input.map(str::to_string),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Parse a response from untyped JSON, rejecting anything that is not
    /// well-formed. No pending state is touched here.
    pub fn parse(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| malformed("response must be an object"))?;

        let correlation_id = match obj.get("correlationId") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::String(_)) => return Err(malformed("correlationId is empty")),
            Some(_) => return Err(malformed("correlationId must be a string")),
            None => return Err(malformed("correlationId is missing")),
        };

        let confirmed = match obj.get("confirmed") {
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(malformed("confirmed must be a boolean")),
            None => return Err(malformed("confirmed is missing")),
        };

        let user_input = match obj.get("userInput") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(malformed("userInput must be a string")),
        };

        let timestamp = match obj.get("timestamp") {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| malformed("timestamp is out of range"))?,
            Some(_) => return Err(malformed("timestamp must be a number")),
            None => return Err(malformed("timestamp is missing")),
        };

        Ok(Self {
            correlation_id,
            confirmed,
            user_input,
            timestamp,
        })
    }
}

fn malformed(reason: &str) -> GuardError {
    GuardError::MalformedResponse(reason.to_string())
}

/// Render a pending request as operator-readable text.
pub fn format_for_display(request: &ConfirmationRequest) -> String {
    let policy = &request.policy;
    let mut out = String::new();

    let _ = writeln!(out, "⚠️  {}", policy.title());
    let _ = writeln!(out);
    let _ = writeln!(out, "Operation:   {}", request.tool_name);
    let _ = writeln!(out, "Description: {}", policy.description);
    let _ = writeln!(out, "Warning:     {}", policy.warning_message);
    let _ = writeln!(out);
    let _ = writeln!(out, "Category:     {}", policy.category);
    let _ = writeln!(out, "Severity:     {}", policy.severity);
    let _ = writeln!(
        out,
        "Reversible:   {}",
        if policy.reversible { "yes" } else { "NO" }
    );
    let _ = writeln!(out, "Impact scope: {}", policy.impact_scope);

    let params = request.sanitized_parameters();
    if !params.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Parameters:");
        for (key, value) in params {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = writeln!(out, "  {}: {}", key, rendered);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "To confirm, type exactly: \"{}\"",
        policy.required_confirmation
    );
    let _ = write!(out, "Expires at: {}", format_timestamp(&request.expires_at));
    out
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
