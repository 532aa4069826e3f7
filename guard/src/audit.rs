//! Security audit events and sinks
//!
//! The guard emits exactly one [`AuditEvent`] per protocol outcome and hands it
//! to an injected [`AuditSink`]. Sinks never influence decisions.

use crate::error::Result;
use crate::policy::Severity;
use crate::protocol::OutcomeCode;
use crate::request::ConfirmationRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Default number of events kept by [`MemoryAuditSink`].
pub const DEFAULT_MEMORY_ENTRIES: usize = 1000;

/// Kind of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    ConfirmationRequested,
    ConfirmationValidated,
    ConfirmationDenied,
    ConfirmationInvalidText,
    ConfirmationCorrelationMismatch,
    ConfirmationExpired,
    ConfirmationCancelled,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::ConfirmationRequested => "confirmation_requested",
            AuditEventKind::ConfirmationValidated => "confirmation_validated",
            AuditEventKind::ConfirmationDenied => "confirmation_denied",
            AuditEventKind::ConfirmationInvalidText => "confirmation_invalid_text",
            AuditEventKind::ConfirmationCorrelationMismatch => {
                "confirmation_correlation_mismatch"
            }
            AuditEventKind::ConfirmationExpired => "confirmation_expired",
            AuditEventKind::ConfirmationCancelled => "confirmation_cancelled",
        }
    }

    /// Outcome recorded for this kind of event.
    pub fn outcome(&self) -> AuditOutcome {
        match self {
            AuditEventKind::ConfirmationRequested => AuditOutcome::Pending,
            AuditEventKind::ConfirmationValidated => AuditOutcome::Allowed,
            AuditEventKind::ConfirmationDenied => AuditOutcome::Denied,
            AuditEventKind::ConfirmationInvalidText
            | AuditEventKind::ConfirmationCorrelationMismatch => AuditOutcome::Rejected,
            AuditEventKind::ConfirmationExpired => AuditOutcome::TimedOut,
            AuditEventKind::ConfirmationCancelled => AuditOutcome::Cancelled,
        }
    }

    /// Protocol code reported to the caller for this outcome.
    pub fn code(&self) -> Option<OutcomeCode> {
        match self {
            AuditEventKind::ConfirmationRequested => Some(OutcomeCode::ConfirmationRequired),
            AuditEventKind::ConfirmationValidated | AuditEventKind::ConfirmationCancelled => None,
            AuditEventKind::ConfirmationDenied => Some(OutcomeCode::ConfirmationDenied),
            AuditEventKind::ConfirmationInvalidText
            | AuditEventKind::ConfirmationCorrelationMismatch => {
                Some(OutcomeCode::ConfirmationInvalid)
            }
            AuditEventKind::ConfirmationExpired => Some(OutcomeCode::ConfirmationTimeout),
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the protocol step an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Pending,
    Allowed,
    Denied,
    Rejected,
    TimedOut,
    Cancelled,
}

/// A structured security event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub timestamp: DateTime<Utc>,
    pub tool_name: String,
    pub correlation_id: String,
    pub outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<OutcomeCode>,
    pub severity: Severity,
    pub category: String,

    /// Sanitized invocation parameters
    pub parameters: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Event about a confirmation request.
    pub fn new(kind: AuditEventKind, request: &ConfirmationRequest) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            tool_name: request.tool_name.clone(),
            correlation_id: request.correlation_id.clone(),
            outcome: kind.outcome(),
            code: kind.code(),
            severity: request.policy.severity,
            category: request.policy.category.clone(),
            parameters: request.sanitized_parameters().clone(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Writes events to `tracing` under the `cloudgate::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let params = Value::Object(event.parameters.clone());
        match event.kind {
            AuditEventKind::ConfirmationCorrelationMismatch => warn!(
                target: "cloudgate::audit",
                event = %event.kind,
                tool = %event.tool_name,
                correlation_id = %event.correlation_id,
                outcome = ?event.outcome,
                severity = %event.severity,
                parameters = %params,
                reason = event.reason.as_deref().unwrap_or(""),
                "Security anomaly"
            ),
            _ => info!(
                target: "cloudgate::audit",
                event = %event.kind,
                tool = %event.tool_name,
                correlation_id = %event.correlation_id,
                outcome = ?event.outcome,
                severity = %event.severity,
                parameters = %params,
                reason = event.reason.as_deref().unwrap_or(""),
                "Audit event"
            ),
        }
    }
}

/// Keeps the most recent events in memory.
#[derive(Debug)]
pub struct MemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
}

impl MemoryAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Recorded events of one kind, oldest first.
    pub fn events_of(&self, kind: AuditEventKind) -> Vec<AuditEvent> {
        self.lock().iter().filter(|e| e.kind == kind).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<AuditEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_ENTRIES)
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        let mut events = self.lock();
        events.push_back(event.clone());
        while events.len() > self.capacity {
            events.pop_front();
        }
    }
}

/// Appends events as JSON lines to a file.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Open (or create) the log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to serialize audit event");
                return;
            }
        };

        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
            error!(error = %e, path = %self.path.display(), "Failed to write audit event");
        }
    }
}

/// Forwards every event to several sinks.
#[derive(Default)]
pub struct MultiAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl MultiAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for MultiAuditSink {
    fn record(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ActionPolicyRegistry;
    use crate::sanitize::{Sanitizer, REDACTED_MARKER};
    use serde_json::json;
    use std::io::{BufRead, BufReader};

    fn request() -> ConfirmationRequest {
        let policy = ActionPolicyRegistry::builtin()
            .lookup("destroy_virtual_machine")
            .cloned()
            .unwrap();
        let params = json!({"id": "vm-1", "password": "hunter2"})
            .as_object()
            .cloned()
            .unwrap();
        ConfirmationRequest::new(
            "confirm_1_test",
            "destroy_virtual_machine",
            policy,
            params,
            &Sanitizer::default(),
            chrono::Duration::minutes(5),
        )
    }

    #[test]
    fn test_event_carries_sanitized_parameters() {
        let event = AuditEvent::new(AuditEventKind::ConfirmationRequested, &request());
        assert_eq!(event.parameters["password"], REDACTED_MARKER);
        assert_eq!(event.outcome, AuditOutcome::Pending);
        assert_eq!(event.code, Some(OutcomeCode::ConfirmationRequired));
        assert_eq!(event.correlation_id, "confirm_1_test");
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(AuditEventKind::ConfirmationCorrelationMismatch).unwrap(),
            AuditEventKind::ConfirmationCorrelationMismatch.as_str()
        );
        assert_eq!(
            AuditEventKind::ConfirmationExpired.code(),
            Some(OutcomeCode::ConfirmationTimeout)
        );
    }

    #[test]
    fn test_memory_sink_is_bounded() {
        let sink = MemoryAuditSink::new(2);
        let req = request();
        sink.record(&AuditEvent::new(AuditEventKind::ConfirmationRequested, &req));
        sink.record(&AuditEvent::new(AuditEventKind::ConfirmationDenied, &req));
        sink.record(&AuditEvent::new(AuditEventKind::ConfirmationExpired, &req));

        let kinds: Vec<_> = sink.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AuditEventKind::ConfirmationDenied,
                AuditEventKind::ConfirmationExpired
            ]
        );
        assert_eq!(sink.events_of(AuditEventKind::ConfirmationRequested).len(), 0);
    }

    #[test]
    fn test_file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit/events.jsonl");
        let sink = FileAuditSink::open(&path).unwrap();
        let req = request();
        sink.record(&AuditEvent::new(AuditEventKind::ConfirmationRequested, &req));
        sink.record(&AuditEvent::new(AuditEventKind::ConfirmationValidated, &req));

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = BufReader::new(file).lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 2);

        let parsed: AuditEvent = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(parsed.kind, AuditEventKind::ConfirmationValidated);
        assert!(!lines[0].contains("hunter2"));
    }

    #[test]
    fn test_multi_sink_fans_out() {
        let a = Arc::new(MemoryAuditSink::default());
        let b = Arc::new(MemoryAuditSink::default());
        let multi = MultiAuditSink::new().with(a.clone()).with(b.clone());
        multi.record(&AuditEvent::new(AuditEventKind::ConfirmationCancelled, &request()));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
