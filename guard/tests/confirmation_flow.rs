//! End-to-end tests of the confirmation protocol
//!
//! These drive the guard the way the gateway does: begin a call, answer the
//! prompt, and check both the outcome and the audit trail.

use cloudgate_guard::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

fn settings() -> GuardSettings {
    GuardSettings::default()
}

fn create_guard(settings: GuardSettings) -> (ConfirmationGuard, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::default());
    let guard = ConfirmationGuard::new(
        Arc::new(ActionPolicyRegistry::builtin()),
        settings,
        audit.clone(),
    );
    (guard, audit)
}

fn params(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

async fn begin_destroy(guard: &ConfirmationGuard, env: &str) -> Gate {
    guard
        .begin(
            "destroy_virtual_machine",
            params(json!({"id": "vm-1"})),
            Some(env),
        )
        .await
        .unwrap()
}

fn expect_prompt(gate: Gate) -> Box<ConfirmationRequired> {
    match gate {
        Gate::ConfirmationRequired(prompt) => prompt,
        Gate::Proceed(_) => panic!("expected a confirmation prompt"),
    }
}

mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_destroy_vm_in_production() {
        let (guard, audit) = create_guard(settings());

        assert!(guard.requires_confirmation("destroy_virtual_machine", Some("production")));

        let prompt = expect_prompt(begin_destroy(&guard, "production").await);
        assert_eq!(prompt.code, OutcomeCode::ConfirmationRequired);
        assert_eq!(prompt.required_confirmation, "destroy permanently");
        assert!(prompt.confirmation_instructions.contains("destroy permanently"));
        assert_eq!(prompt.parameters["id"], "vm-1");
        assert_eq!(prompt.action_details.severity, Severity::Critical);
        assert!(!prompt.action_details.reversible);

        let answer =
            ConfirmationResponse::new(prompt.correlation_id.clone(), true, Some("destroy permanently"));
        let action = guard
            .confirm("destroy_virtual_machine", &answer)
            .await
            .unwrap();
        assert_eq!(action.parameters()["id"], "vm-1");
        assert!(guard.get(&prompt.correlation_id).await.is_none());

        // Replay is rejected generically
        let err = guard
            .confirm("destroy_virtual_machine", &answer)
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::Expired));
        assert_eq!(err.code(), Some(OutcomeCode::ConfirmationExpired));

        let kinds: Vec<_> = audit.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AuditEventKind::ConfirmationRequested,
                AuditEventKind::ConfirmationValidated
            ]
        );
    }

    #[tokio::test]
    async fn test_destroy_vm_in_test_environment() {
        let (guard, audit) = create_guard(settings());

        assert!(!guard.requires_confirmation("destroy_virtual_machine", Some("test")));

        match begin_destroy(&guard, "test").await {
            Gate::Proceed(params) => assert_eq!(params["id"], "vm-1"),
            Gate::ConfirmationRequired(_) => panic!("test environment must bypass"),
        }
        assert!(guard.pending().await.is_empty());
        assert!(audit.is_empty());
    }
}

mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_declined_is_always_rejected() {
        let (guard, _) = create_guard(settings());

        for input in [None, Some("destroy permanently"), Some("anything")] {
            let prompt = expect_prompt(begin_destroy(&guard, "production").await);
            let answer = ConfirmationResponse::new(prompt.correlation_id.clone(), false, input);
            let err = guard
                .confirm("destroy_virtual_machine", &answer)
                .await
                .unwrap_err();
            assert!(matches!(err, GuardError::Denied(_)));
            assert_eq!(err.code(), Some(OutcomeCode::ConfirmationDenied));
        }
    }

    #[tokio::test]
    async fn test_phrase_variants() {
        let (guard, _) = create_guard(settings());

        let accepted = ["DESTROY PERMANENTLY", "destroy permanently", "  Destroy Permanently  "];
        for input in accepted {
            let prompt = expect_prompt(begin_destroy(&guard, "production").await);
            let answer = ConfirmationResponse::new(prompt.correlation_id.clone(), true, Some(input));
            assert!(
                guard.confirm("destroy_virtual_machine", &answer).await.is_ok(),
                "rejected {:?}",
                input
            );
        }

        let rejected = ["destroy permanently!", "destroy_permanently", "destroy", "yes"];
        for input in rejected {
            let prompt = expect_prompt(begin_destroy(&guard, "production").await);
            let answer = ConfirmationResponse::new(prompt.correlation_id.clone(), true, Some(input));
            let err = guard
                .confirm("destroy_virtual_machine", &answer)
                .await
                .unwrap_err();
            assert!(matches!(err, GuardError::InvalidText(_)), "accepted {:?}", input);
        }
    }

    #[tokio::test]
    async fn test_failed_confirmation_consumes_token() {
        let (guard, _) = create_guard(settings());
        let prompt = expect_prompt(begin_destroy(&guard, "production").await);

        let wrong = ConfirmationResponse::new(prompt.correlation_id.clone(), true, Some("destroy"));
        assert!(guard.confirm("destroy_virtual_machine", &wrong).await.is_err());

        let right =
            ConfirmationResponse::new(prompt.correlation_id.clone(), true, Some("destroy permanently"));
        let err = guard
            .confirm("destroy_virtual_machine", &right)
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::Expired));
    }

    #[tokio::test]
    async fn test_unknown_correlation_id() {
        let (guard, audit) = create_guard(settings());
        let answer = ConfirmationResponse::new("confirm_999_nope", true, Some("destroy permanently"));
        let err = guard
            .confirm("destroy_virtual_machine", &answer)
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::Expired));
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_carries_context() {
        let (guard, _) = create_guard(settings());
        let prompt = expect_prompt(begin_destroy(&guard, "production").await);
        let answer = ConfirmationResponse::new(prompt.correlation_id.clone(), true, Some("no"));
        let err = guard
            .confirm("destroy_virtual_machine", &answer)
            .await
            .unwrap_err();

        let ctx = err.context().unwrap();
        assert_eq!(ctx.required_confirmation, "destroy permanently");
        assert_eq!(ctx.severity, Severity::Critical);
        assert_eq!(ctx.category, "Virtual Machine Operations");
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_capacity_limit() {
        let (guard, audit) = create_guard(GuardSettings {
            max_pending: 3,
            ..settings()
        });

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(expect_prompt(begin_destroy(&guard, "production").await).correlation_id);
        }

        let err = guard
            .begin(
                "destroy_virtual_machine",
                params(json!({"id": "vm-4"})),
                Some("production"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::Capacity { max_pending: 3 }));

        for id in &ids {
            assert!(guard.get(id).await.is_some());
        }
        assert_eq!(
            audit.events_of(AuditEventKind::ConfirmationRequested).len(),
            3
        );

        // Bypassed calls are unaffected by a full store
        assert!(matches!(
            begin_destroy(&guard, "development").await,
            Gate::Proceed(_)
        ));
    }

    #[tokio::test]
    async fn test_expired_confirmation_is_unreachable() {
        let (guard, audit) = create_guard(GuardSettings {
            timeout: Duration::from_millis(50),
            ..settings()
        });

        let prompt = expect_prompt(begin_destroy(&guard, "production").await);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(guard.get(&prompt.correlation_id).await.is_none());

        let answer =
            ConfirmationResponse::new(prompt.correlation_id.clone(), true, Some("destroy permanently"));
        let err = guard
            .confirm("destroy_virtual_machine", &answer)
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::Expired));

        let expired = audit.events_of(AuditEventKind::ConfirmationExpired);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].code, Some(OutcomeCode::ConfirmationTimeout));
        assert!(audit
            .events_of(AuditEventKind::ConfirmationValidated)
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirmations_allow_once() {
        let (guard, audit) = create_guard(settings());
        let guard = Arc::new(guard);
        let prompt = expect_prompt(begin_destroy(&guard, "production").await);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                let answer = ConfirmationResponse::new(
                    prompt.correlation_id.clone(),
                    true,
                    Some("destroy permanently"),
                );
                tokio::spawn(async move {
                    guard
                        .confirm("destroy_virtual_machine", &answer)
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
        assert_eq!(
            audit.events_of(AuditEventKind::ConfirmationValidated).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_correlation_ids_never_repeat() {
        let (guard, _) = create_guard(GuardSettings {
            max_pending: 1000,
            ..settings()
        });
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let prompt = expect_prompt(begin_destroy(&guard, "production").await);
            assert!(seen.insert(prompt.correlation_id));
        }
    }

    #[tokio::test]
    async fn test_sensitive_parameters_never_reach_audit_or_prompt() {
        let (guard, audit) = create_guard(settings());
        let prompt = expect_prompt(
            guard
                .begin(
                    "reinstall_virtual_machine",
                    params(json!({"id": "vm-1", "root_password": "hunter2"})),
                    Some("production"),
                )
                .await
                .unwrap(),
        );

        assert_eq!(prompt.parameters["root_password"], "[REDACTED]");
        let pending = guard.get(&prompt.correlation_id).await.unwrap();
        assert!(!format_for_display(&pending.request).contains("hunter2"));
        assert!(!prompt.display.contains("hunter2"));
        for event in audit.events() {
            assert!(!serde_json::to_string(&event).unwrap().contains("hunter2"));
        }

        let answer =
            ConfirmationResponse::new(prompt.correlation_id.clone(), true, Some("reinstall and erase"));
        let action = guard
            .confirm("reinstall_virtual_machine", &answer)
            .await
            .unwrap();
        assert_eq!(action.parameters()["root_password"], "hunter2");
    }
}

mod display_tests {
    use super::*;

    #[tokio::test]
    async fn test_format_for_display() {
        let (guard, _) = create_guard(settings());
        let prompt = expect_prompt(begin_destroy(&guard, "production").await);
        let pending = guard.get(&prompt.correlation_id).await.unwrap();

        let text = format_for_display(&pending.request);
        assert!(text.contains("Critical action requires confirmation"));
        assert!(text.contains("destroy_virtual_machine"));
        assert!(text.contains("\"destroy permanently\""));
        assert!(text.contains("Virtual Machine Operations"));
        assert!(text.contains("single-resource"));
        assert!(text.contains("Reversible:   NO"));
        assert!(text.contains("id: vm-1"));
        assert!(text.contains("Expires at:"));
        assert_eq!(prompt.display, text);
    }

    #[tokio::test]
    async fn test_prompt_wire_shape() {
        let (guard, _) = create_guard(settings());
        let prompt = expect_prompt(begin_destroy(&guard, "production").await);
        let wire = serde_json::to_value(&prompt).unwrap();

        assert_eq!(wire["code"], "CONFIRMATION_REQUIRED");
        assert!(wire["correlationId"].is_string());
        assert!(wire["warningMessage"].is_string());
        assert!(wire["confirmationInstructions"].is_string());
        assert_eq!(wire["actionDetails"]["impactScope"], "single-resource");
        assert_eq!(wire["actionDetails"]["severity"], "critical");
        assert_eq!(wire["actionDetails"]["category"], "Virtual Machine Operations");
        assert_eq!(wire["actionDetails"]["reversible"], false);
        assert!(wire["expiresAt"].as_i64().unwrap() > chrono::Utc::now().timestamp_millis());
    }
}
