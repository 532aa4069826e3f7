//! Gateway context
//!
//! Shared state handed to every request handler: the confirmation guard, the
//! remote API that guarded calls are forwarded to, and the environment label
//! assumed when a caller does not send one.

use crate::remote::RemoteResourceApi;
use cloudgate_guard::{ConfirmationGuard, MemoryAuditSink};
use std::sync::Arc;

pub struct GatewayContext {
    pub guard: Arc<ConfirmationGuard>,

    pub remote: Arc<dyn RemoteResourceApi>,

    /// Environment used when `tools/call` carries none
    pub default_environment: Option<String>,

    /// Recent audit events, exposed by `confirmations/list`
    pub recent_events: Option<Arc<MemoryAuditSink>>,
}

impl GatewayContext {
    pub fn new(guard: Arc<ConfirmationGuard>, remote: Arc<dyn RemoteResourceApi>) -> Self {
        Self {
            guard,
            remote,
            default_environment: None,
            recent_events: None,
        }
    }

    pub fn with_default_environment(mut self, environment: Option<String>) -> Self {
        self.default_environment = environment;
        self
    }

    pub fn with_recent_events(mut self, sink: Arc<MemoryAuditSink>) -> Self {
        self.recent_events = Some(sink);
        self
    }

    /// Environment for a call: the caller's label, else the configured default.
    pub fn environment<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or(self.default_environment.as_deref())
    }
}
