//! Confirmation requests and their builder

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::policy::ActionPolicy;
use crate::registry::ActionPolicyRegistry;
use crate::sanitize::Sanitizer;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Default confirmation window (5 minutes).
pub const DEFAULT_CONFIRMATION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Longest confirmation window (7 days). Longer timeouts are clamped to it.
pub const MAX_CONFIRMATION_TIMEOUT: std::time::Duration =
    std::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Clamp a configured timeout into `1ms..=MAX_CONFIRMATION_TIMEOUT`.
fn clamp_ttl(ttl: Duration) -> Duration {
    let max = Duration::seconds(MAX_CONFIRMATION_TIMEOUT.as_secs() as i64);
    ttl.clamp(Duration::milliseconds(1), max)
}

/// A guarded invocation waiting for confirmation. Immutable once built.
#[derive(Clone)]
pub struct ConfirmationRequest {
    /// One-time correlation id
    pub correlation_id: String,

    /// Guarded operation
    pub tool_name: String,

    /// Matched policy
    pub policy: ActionPolicy,

    /// When the request was created
    pub created_at: DateTime<Utc>,

    /// When the request stops being confirmable
    pub expires_at: DateTime<Utc>,

    parameters: Map<String, Value>,
    sanitized: Map<String, Value>,
}

impl ConfirmationRequest {
    /// Create a request. `ttl` is clamped to between one millisecond and
    /// [`MAX_CONFIRMATION_TIMEOUT`], so `expires_at` is always after
    /// `created_at`.
    pub fn new(
        correlation_id: impl Into<String>,
        tool_name: impl Into<String>,
        policy: ActionPolicy,
        parameters: Map<String, Value>,
        sanitizer: &Sanitizer,
        ttl: Duration,
    ) -> Self {
        let created_at = Utc::now();
        let ttl = clamp_ttl(ttl);
        let sanitized = sanitizer.sanitize(&parameters);
        let expires_at = created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            correlation_id: correlation_id.into(),
            tool_name: tool_name.into(),
            policy,
            created_at,
            expires_at,
            parameters,
            sanitized,
        }
    }

    /// The caller's original parameters. Never log these.
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Parameters with sensitive values redacted and long values truncated.
    pub fn sanitized_parameters(&self) -> &Map<String, Value> {
        &self.sanitized
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for ConfirmationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationRequest")
            .field("correlation_id", &self.correlation_id)
            .field("tool_name", &self.tool_name)
            .field("severity", &self.policy.severity)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("parameters", &self.sanitized)
            .finish()
    }
}

/// Builds [`ConfirmationRequest`]s and announces them to the audit sink.
pub struct RequestBuilder {
    registry: Arc<ActionPolicyRegistry>,
    sanitizer: Arc<Sanitizer>,
    audit: Arc<dyn AuditSink>,
    timeout: Duration,
    sequence: AtomicU64,
}

impl RequestBuilder {
    pub fn new(
        registry: Arc<ActionPolicyRegistry>,
        sanitizer: Arc<Sanitizer>,
        audit: Arc<dyn AuditSink>,
        timeout: std::time::Duration,
    ) -> Self {
        let timeout = Duration::from_std(timeout.min(MAX_CONFIRMATION_TIMEOUT))
            .map(clamp_ttl)
            .unwrap_or_else(|_| clamp_ttl(Duration::max_value()));
        Self {
            registry,
            sanitizer,
            audit,
            timeout,
            sequence: AtomicU64::new(0),
        }
    }

    /// Confirmation window applied to new requests.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build a request for `tool` if it is guarded, `None` otherwise.
    pub fn build_for(&self, tool: &str, parameters: Map<String, Value>) -> Option<ConfirmationRequest> {
        let policy = self.registry.lookup(tool)?.clone();
        Some(self.build(tool, parameters, policy))
    }

    /// Build a request with an explicit policy and emit
    /// `confirmation_requested`.
    pub fn build(
        &self,
        tool: &str,
        parameters: Map<String, Value>,
        policy: ActionPolicy,
    ) -> ConfirmationRequest {
        let request = self.prepare(tool, parameters, policy);
        self.announce(&request);
        request
    }

    /// Build a request without announcing it. Callers that may still refuse
    /// the request call [`announce`](Self::announce) once it is accepted.
    pub fn prepare(
        &self,
        tool: &str,
        parameters: Map<String, Value>,
        policy: ActionPolicy,
    ) -> ConfirmationRequest {
        let request = ConfirmationRequest::new(
            self.next_correlation_id(),
            tool,
            policy,
            parameters,
            &self.sanitizer,
            self.timeout,
        );

        debug!(
            tool = %request.tool_name,
            correlation_id = %request.correlation_id,
            expires_at = %request.expires_at,
            "Built confirmation request"
        );
        request
    }

    /// Emit `confirmation_requested` for `request`.
    pub fn announce(&self, request: &ConfirmationRequest) {
        self.audit
            .record(&AuditEvent::new(AuditEventKind::ConfirmationRequested, request));
    }

    /// `confirm_<sequence>_<uuid>`: the sequence makes ids unique for the
    /// lifetime of the process, the v4 uuid makes them unguessable.
    fn next_correlation_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("confirm_{}_{}", seq, Uuid::new_v4().simple())
    }
}
