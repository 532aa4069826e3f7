//! # Cloudgate confirmation guard
//!
//! Human-in-the-loop protection for destructive cloud operations. A call to a
//! guarded tool is not executed directly: it is parked as a pending
//! confirmation and the caller receives a prompt naming the exact phrase to
//! type back. Only a matching, timely answer lets the call through, and every
//! step is reported to an audit sink.
//!
//! ## Components
//!
//! - [`registry`]: which operations are dangerous and how
//! - [`request`]: builds correlated confirmation requests
//! - [`store`]: bounded, self-expiring pending state
//! - [`bypass`]: environments that skip confirmation
//! - [`validator`]: checks answers against pending requests
//! - [`protocol`]: wire payloads, response parsing, display formatting
//! - [`audit`]: audit events and sinks
//! - [`guard`]: the orchestrator
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cloudgate_guard::{
//!     ActionPolicyRegistry, ConfirmationGuard, ConfirmationResponse, Gate, GuardSettings,
//!     TracingAuditSink,
//! };
//! use serde_json::{json, Map};
//! use std::sync::Arc;
//!
//! # async fn run() -> cloudgate_guard::Result<()> {
//! let guard = ConfirmationGuard::new(
//!     Arc::new(ActionPolicyRegistry::builtin()),
//!     GuardSettings::default(),
//!     Arc::new(TracingAuditSink),
//! );
//!
//! let params = json!({"id": "vm-1"}).as_object().cloned().unwrap_or_default();
//! if let Gate::ConfirmationRequired(prompt) =
//!     guard.begin("destroy_virtual_machine", params, Some("production")).await?
//! {
//!     let answer = ConfirmationResponse::new(
//!         prompt.correlation_id.clone(),
//!         true,
//!         Some("destroy permanently"),
//!     );
//!     let action = guard.confirm("destroy_virtual_machine", &answer).await?;
//!     println!("run {} with {:?}", action.tool_name(), action.parameters());
//! }
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod bypass;
pub mod error;
pub mod guard;
pub mod policy;
pub mod protocol;
pub mod registry;
pub mod request;
pub mod sanitize;
pub mod store;
pub mod validator;

use std::time::Duration;

pub use audit::{
    AuditEvent, AuditEventKind, AuditOutcome, AuditSink, FileAuditSink, MemoryAuditSink,
    MultiAuditSink, TracingAuditSink,
};
pub use bypass::BypassPolicy;
pub use error::{GuardError, RejectionContext, Result};
pub use guard::{ConfirmationGuard, ConfirmedAction, Gate};
pub use policy::{ActionPolicy, ImpactScope, Severity};
pub use protocol::{
    format_for_display, ActionDetails, ConfirmationRequired, ConfirmationResponse, OutcomeCode,
};
pub use registry::ActionPolicyRegistry;
pub use request::{ConfirmationRequest, RequestBuilder};
pub use sanitize::Sanitizer;
pub use store::{ExpiryHandle, PendingConfirmation, PendingStore, StoreStats};
pub use validator::{ConfirmationValidator, Rejection, Verdict};

/// Tunables of the confirmation protocol
#[derive(Debug, Clone)]
pub struct GuardSettings {
    /// How long a confirmation stays answerable
    pub timeout: Duration,

    /// Maximum number of live pending confirmations
    pub max_pending: usize,

    /// Environments in which guarded tools run without confirmation
    pub bypass_environments: Vec<String>,

    /// Redaction applied to parameters before audit and display
    pub sanitizer: Sanitizer,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            timeout: request::DEFAULT_CONFIRMATION_TIMEOUT,
            max_pending: store::DEFAULT_MAX_PENDING,
            bypass_environments: bypass::DEFAULT_BYPASS_ENVIRONMENTS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            sanitizer: Sanitizer::default(),
        }
    }
}
