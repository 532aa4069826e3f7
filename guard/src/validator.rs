//! Confirmation response validation

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::error::{GuardError, RejectionContext};
use crate::protocol::ConfirmationResponse;
use crate::request::ConfirmationRequest;
use crate::store::PendingConfirmation;
use std::sync::Arc;
use tracing::{info, warn};

/// Why a response was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The response belongs to a different request
    CorrelationMismatch,
    /// The caller declined
    Denied,
    /// The typed phrase does not match
    InvalidText,
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::CorrelationMismatch => "correlation id mismatch",
            Rejection::Denied => "operation cancelled by user",
            Rejection::InvalidText => "invalid confirmation text",
        }
    }

    fn audit_kind(&self) -> AuditEventKind {
        match self {
            Rejection::CorrelationMismatch => AuditEventKind::ConfirmationCorrelationMismatch,
            Rejection::Denied => AuditEventKind::ConfirmationDenied,
            Rejection::InvalidText => AuditEventKind::ConfirmationInvalidText,
        }
    }

    /// Typed error carrying the policy context of `request`.
    pub fn into_error(self, request: &ConfirmationRequest) -> GuardError {
        let context = Box::new(rejection_context(request));
        match self {
            Rejection::CorrelationMismatch => GuardError::CorrelationMismatch(context),
            Rejection::Denied => GuardError::Denied(context),
            Rejection::InvalidText => GuardError::InvalidText(context),
        }
    }
}

/// Validation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(Rejection),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

pub(crate) fn rejection_context(request: &ConfirmationRequest) -> RejectionContext {
    RejectionContext {
        tool_name: request.tool_name.clone(),
        category: request.policy.category.clone(),
        severity: request.policy.severity,
        required_confirmation: request.policy.required_confirmation.clone(),
    }
}

/// Checks responses against pending entries and records the outcome.
pub struct ConfirmationValidator {
    audit: Arc<dyn AuditSink>,
}

impl ConfirmationValidator {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { audit }
    }

    /// Decide whether `response` confirms `pending`.
    ///
    /// Checks run in order and the first failure decides: correlation id,
    /// then the confirmed flag, then the typed phrase. Exactly one audit event
    /// is recorded per call.
    pub fn validate(&self, pending: &PendingConfirmation, response: &ConfirmationResponse) -> Verdict {
        let request = &pending.request;

        let verdict = if response.correlation_id != request.correlation_id {
            Verdict::Deny(Rejection::CorrelationMismatch)
        } else if !response.confirmed {
            Verdict::Deny(Rejection::Denied)
        } else if !response
            .user_input
            .as_deref()
            .map(|input| request.policy.phrase_matches(input))
            .unwrap_or(false)
        {
            Verdict::Deny(Rejection::InvalidText)
        } else {
            Verdict::Allow
        };

        match verdict {
            Verdict::Allow => {
                info!(
                    tool = %request.tool_name,
                    correlation_id = %request.correlation_id,
                    "Dangerous action confirmed"
                );
                self.audit.record(&AuditEvent::new(
                    AuditEventKind::ConfirmationValidated,
                    request,
                ));
            }
            Verdict::Deny(rejection) => self.record_rejection(request, rejection, response),
        }

        verdict
    }

    /// Record a mismatch detected outside [`validate`](Self::validate), such as
    /// a response replayed against a different tool.
    pub fn reject_mismatch(&self, request: &ConfirmationRequest, detail: &str) {
        warn!(
            tool = %request.tool_name,
            correlation_id = %request.correlation_id,
            detail,
            "Confirmation used for a different operation"
        );
        self.audit.record(
            &AuditEvent::new(AuditEventKind::ConfirmationCorrelationMismatch, request)
                .with_reason(detail),
        );
    }

    fn record_rejection(
        &self,
        request: &ConfirmationRequest,
        rejection: Rejection,
        response: &ConfirmationResponse,
    ) {
        match rejection {
            Rejection::CorrelationMismatch => warn!(
                tool = %request.tool_name,
                expected = %request.correlation_id,
                received = %crate::sanitize::truncate(&response.correlation_id, 64),
                "Confirmation correlation id mismatch"
            ),
            _ => info!(
                tool = %request.tool_name,
                correlation_id = %request.correlation_id,
                reason = rejection.reason(),
                "Confirmation rejected"
            ),
        }

        self.audit.record(
            &AuditEvent::new(rejection.audit_kind(), request).with_reason(rejection.reason()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::registry::ActionPolicyRegistry;
    use crate::sanitize::Sanitizer;
    use crate::store::PendingStore;
    use serde_json::Map;

    async fn pending() -> (PendingConfirmation, PendingStore) {
        let store = PendingStore::new(10, Arc::new(MemoryAuditSink::default()));
        let policy = ActionPolicyRegistry::builtin()
            .lookup("destroy_virtual_machine")
            .cloned()
            .unwrap();
        let request = ConfirmationRequest::new(
            "confirm_1_abc",
            "destroy_virtual_machine",
            policy,
            Map::new(),
            &Sanitizer::default(),
            chrono::Duration::minutes(5),
        );
        (store.create(request).await.unwrap(), store)
    }

    fn response(id: &str, confirmed: bool, input: Option<&str>) -> ConfirmationResponse {
        ConfirmationResponse::new(id, confirmed, input)
    }

    #[tokio::test]
    async fn test_accepts_exact_phrase() {
        let (pending, _store) = pending().await;
        let audit = Arc::new(MemoryAuditSink::default());
        let validator = ConfirmationValidator::new(audit.clone());

        let verdict = validator.validate(
            &pending,
            &response("confirm_1_abc", true, Some("destroy permanently")),
        );
        assert!(verdict.is_allowed());
        assert_eq!(
            audit.events_of(AuditEventKind::ConfirmationValidated).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_case_and_padding_accepted() {
        let (pending, _store) = pending().await;
        let validator = ConfirmationValidator::new(Arc::new(MemoryAuditSink::default()));

        for input in ["DESTROY PERMANENTLY", "  destroy permanently\t", "Destroy Permanently"] {
            let verdict = validator.validate(&pending, &response("confirm_1_abc", true, Some(input)));
            assert_eq!(verdict, Verdict::Allow, "rejected {:?}", input);
        }
    }

    #[tokio::test]
    async fn test_check_order() {
        let (pending, _store) = pending().await;
        let audit = Arc::new(MemoryAuditSink::default());
        let validator = ConfirmationValidator::new(audit.clone());

        // Mismatch wins over everything else
        assert_eq!(
            validator.validate(&pending, &response("other", false, Some("nope"))),
            Verdict::Deny(Rejection::CorrelationMismatch)
        );
        // Denial wins over a wrong or even correct phrase
        assert_eq!(
            validator.validate(
                &pending,
                &response("confirm_1_abc", false, Some("destroy permanently"))
            ),
            Verdict::Deny(Rejection::Denied)
        );
        assert_eq!(
            validator.validate(&pending, &response("confirm_1_abc", true, Some("destroy"))),
            Verdict::Deny(Rejection::InvalidText)
        );
        assert_eq!(
            validator.validate(&pending, &response("confirm_1_abc", true, None)),
            Verdict::Deny(Rejection::InvalidText)
        );

        let kinds: Vec<_> = audit.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AuditEventKind::ConfirmationCorrelationMismatch,
                AuditEventKind::ConfirmationDenied,
                AuditEventKind::ConfirmationInvalidText,
                AuditEventKind::ConfirmationInvalidText,
            ]
        );
    }

    #[tokio::test]
    async fn test_rejection_errors_carry_context() {
        let (pending, _store) = pending().await;
        let err = Rejection::InvalidText.into_error(&pending.request);
        let ctx = err.context().unwrap();
        assert_eq!(ctx.required_confirmation, "destroy permanently");
        assert_eq!(ctx.category, "Virtual Machine Operations");
    }
}
