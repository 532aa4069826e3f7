//! Confirmation guard
//!
//! Ties the registry, bypass policy, builder, store and validator together.
//! A guarded call goes through [`ConfirmationGuard::begin`] first and, once
//! the caller answers, through [`ConfirmationGuard::confirm`].

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::bypass::BypassPolicy;
use crate::error::{GuardError, Result};
use crate::protocol::{ConfirmationRequired, ConfirmationResponse};
use crate::registry::ActionPolicyRegistry;
use crate::request::{ConfirmationRequest, RequestBuilder};
use crate::store::{PendingConfirmation, PendingStore, StoreStats};
use crate::validator::{rejection_context, ConfirmationValidator, Verdict};
use crate::GuardSettings;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of starting a call.
#[derive(Debug)]
pub enum Gate {
    /// Not guarded, or bypassed: run the call with these parameters
    Proceed(Map<String, Value>),
    /// Guarded: the caller has to confirm first
    ConfirmationRequired(Box<ConfirmationRequired>),
}

/// A successfully confirmed call. Execute it with the stored parameters, not
/// with whatever accompanied the confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmedAction {
    pub request: Arc<ConfirmationRequest>,
}

impl ConfirmedAction {
    pub fn tool_name(&self) -> &str {
        &self.request.tool_name
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        self.request.parameters()
    }
}

/// Human-in-the-loop guard for dangerous operations
pub struct ConfirmationGuard {
    registry: Arc<ActionPolicyRegistry>,
    bypass: BypassPolicy,
    builder: RequestBuilder,
    store: PendingStore,
    validator: ConfirmationValidator,
    audit: Arc<dyn AuditSink>,
}

impl ConfirmationGuard {
    pub fn new(
        registry: Arc<ActionPolicyRegistry>,
        settings: GuardSettings,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let bypass = BypassPolicy::new(registry.clone(), &settings.bypass_environments);
        let builder = RequestBuilder::new(
            registry.clone(),
            Arc::new(settings.sanitizer),
            audit.clone(),
            settings.timeout,
        );
        let store = PendingStore::new(settings.max_pending, audit.clone());
        let validator = ConfirmationValidator::new(audit.clone());

        info!(
            guarded_tools = registry.len(),
            timeout_secs = settings.timeout.as_secs(),
            max_pending = settings.max_pending,
            bypass = ?bypass.environments(),
            "Confirmation guard initialized"
        );

        Self {
            registry,
            bypass,
            builder,
            store,
            validator,
            audit,
        }
    }

    pub fn registry(&self) -> &ActionPolicyRegistry {
        &self.registry
    }

    pub fn bypass(&self) -> &BypassPolicy {
        &self.bypass
    }

    /// Whether `tool` would need confirmation in `environment`.
    pub fn requires_confirmation(&self, tool: &str, environment: Option<&str>) -> bool {
        self.bypass.requires_confirmation(tool, environment)
    }

    /// Start a call. Unguarded or bypassed calls proceed immediately; guarded
    /// calls are stored pending and answered with a confirmation prompt.
    pub async fn begin(
        &self,
        tool: &str,
        parameters: Map<String, Value>,
        environment: Option<&str>,
    ) -> Result<Gate> {
        if !self.bypass.requires_confirmation(tool, environment) {
            if self.registry.is_dangerous(tool) {
                info!(tool, environment, "Confirmation bypassed for environment");
            }
            return Ok(Gate::Proceed(parameters));
        }

        let Some(policy) = self.registry.lookup(tool).cloned() else {
            return Ok(Gate::Proceed(parameters));
        };

        // Checked again, authoritatively, by the store. This only avoids
        // announcing requests that are certain to be rejected.
        if !self.store.has_capacity().await {
            warn!(tool, "Rejecting guarded call: too many pending confirmations");
            return Err(GuardError::Capacity {
                max_pending: self.store.max_pending(),
            });
        }

        // Announced only once stored, so a refused request leaves no
        // `confirmation_requested` event behind.
        let request = self.builder.prepare(tool, parameters, policy);
        let pending = self
            .store
            .create_then(request, |stored| self.builder.announce(stored))
            .await?;

        info!(
            tool,
            correlation_id = %pending.correlation_id(),
            severity = %pending.request.policy.severity,
            "Confirmation required"
        );

        Ok(Gate::ConfirmationRequired(Box::new(
            ConfirmationRequired::from_request(&pending.request),
        )))
    }

    /// Answer a pending confirmation for `tool`.
    ///
    /// The pending entry is consumed whatever the outcome; a rejected
    /// confirmation cannot be retried with the same correlation id.
    pub async fn confirm(
        &self,
        tool: &str,
        response: &ConfirmationResponse,
    ) -> Result<ConfirmedAction> {
        let Some(pending) = self.store.take(&response.correlation_id).await else {
            debug!(tool, "Confirmation for unknown or expired correlation id");
            return Err(GuardError::Expired);
        };

        if pending.request.tool_name != tool {
            self.validator.reject_mismatch(
                &pending.request,
                &format!("confirmation submitted for '{}'", tool),
            );
            return Err(GuardError::CorrelationMismatch(Box::new(rejection_context(
                &pending.request,
            ))));
        }

        match self.validator.validate(&pending, response) {
            Verdict::Allow => Ok(ConfirmedAction {
                request: pending.request,
            }),
            Verdict::Deny(rejection) => Err(rejection.into_error(&pending.request)),
        }
    }

    /// Parse an untyped response and answer it. Malformed responses are
    /// rejected without touching pending state.
    pub async fn confirm_value(&self, tool: &str, response: &Value) -> Result<ConfirmedAction> {
        let response = ConfirmationResponse::parse(response)?;
        self.confirm(tool, &response).await
    }

    /// Explicitly cancel a pending confirmation.
    pub async fn cancel(&self, correlation_id: &str) -> bool {
        match self.store.take(correlation_id).await {
            Some(pending) => {
                info!(correlation_id, tool = %pending.request.tool_name, "Confirmation cancelled");
                self.audit.record(&AuditEvent::new(
                    AuditEventKind::ConfirmationCancelled,
                    &pending.request,
                ));
                true
            }
            None => false,
        }
    }

    /// Live pending confirmation, if any.
    pub async fn get(&self, correlation_id: &str) -> Option<PendingConfirmation> {
        self.store.get(correlation_id).await
    }

    pub async fn pending(&self) -> Vec<PendingConfirmation> {
        self.store.list_all().await
    }

    pub async fn stats(&self) -> StoreStats {
        self.store.stats().await
    }

    /// Discard every pending confirmation.
    pub async fn shutdown(&self) -> usize {
        self.store.clear().await
    }
}
