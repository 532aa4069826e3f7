//! Pending confirmation store
//!
//! Holds every confirmation request that is waiting for an answer. Each entry
//! owns a spawned expiry task; removing the entry aborts the task, and the task
//! only acts if the entry is still present, so timeout and confirmation can
//! never both succeed for the same correlation id.

use crate::audit::{AuditEvent, AuditEventKind, AuditSink};
use crate::error::{GuardError, Result};
use crate::request::ConfirmationRequest;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Default maximum number of live pending confirmations.
pub const DEFAULT_MAX_PENDING: usize = 100;

type Entries = HashMap<String, PendingConfirmation>;

/// Cancellable handle to an entry's scheduled expiry.
#[derive(Debug, Clone)]
pub struct ExpiryHandle {
    handle: AbortHandle,
}

impl ExpiryHandle {
    /// Cancel the scheduled expiry. Idempotent.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the expiry task has finished (fired or cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// A live store entry
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub request: Arc<ConfirmationRequest>,
    expiry: ExpiryHandle,
}

impl PendingConfirmation {
    pub fn correlation_id(&self) -> &str {
        &self.request.correlation_id
    }

    pub fn expiry(&self) -> &ExpiryHandle {
        &self.expiry
    }
}

/// Snapshot of the store for observability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub pending: usize,
    pub max_pending: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub oldest_age_secs: Option<i64>,
}

/// Bounded map from correlation id to pending confirmation.
pub struct PendingStore {
    entries: Arc<RwLock<Entries>>,
    max_pending: usize,
    audit: Arc<dyn AuditSink>,
}

impl PendingStore {
    pub fn new(max_pending: usize, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_pending,
            audit,
        }
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    /// Whether another entry could be created right now.
    pub async fn has_capacity(&self) -> bool {
        self.entries.read().await.len() < self.max_pending
    }

    /// Store a request and schedule its expiry.
    ///
    /// Fails with [`GuardError::Capacity`] when the store is full; existing
    /// entries are never evicted to make room.
    pub async fn create(&self, request: ConfirmationRequest) -> Result<PendingConfirmation> {
        self.create_then(request, |_| {}).await
    }

    /// Like [`create`](Self::create), running `on_stored` once the entry is
    /// in the map and before the write lock is released. Nothing runs when
    /// the request is refused, and the entry's expiry cannot be observed
    /// before `on_stored` returns.
    pub async fn create_then<F>(
        &self,
        request: ConfirmationRequest,
        on_stored: F,
    ) -> Result<PendingConfirmation>
    where
        F: FnOnce(&ConfirmationRequest),
    {
        let mut entries = self.entries.write().await;

        if entries.len() >= self.max_pending {
            warn!(
                tool = %request.tool_name,
                pending = entries.len(),
                max_pending = self.max_pending,
                "Pending confirmation capacity reached"
            );
            return Err(GuardError::Capacity {
                max_pending: self.max_pending,
            });
        }

        if entries.contains_key(&request.correlation_id) {
            return Err(GuardError::DuplicateCorrelationId(
                request.correlation_id.clone(),
            ));
        }

        let request = Arc::new(request);
        let delay = (request.expires_at - Utc::now())
            .to_std()
            .unwrap_or_default();

        // The task cannot observe the map until this write lock is released,
        // by which point the entry is inserted.
        let task = tokio::spawn(expire_after(
            Arc::downgrade(&self.entries),
            request.correlation_id.clone(),
            delay,
            self.audit.clone(),
        ));

        let pending = PendingConfirmation {
            request: request.clone(),
            expiry: ExpiryHandle {
                handle: task.abort_handle(),
            },
        };
        entries.insert(request.correlation_id.clone(), pending.clone());
        on_stored(request.as_ref());

        debug!(
            correlation_id = %request.correlation_id,
            tool = %request.tool_name,
            pending = entries.len(),
            "Stored pending confirmation"
        );

        Ok(pending)
    }

    /// Look up a live entry. Entries past their expiry are never returned,
    /// even if the expiry task has not run yet.
    pub async fn get(&self, correlation_id: &str) -> Option<PendingConfirmation> {
        let entries = self.entries.read().await;
        entries
            .get(correlation_id)
            .filter(|p| !p.request.is_expired())
            .cloned()
    }

    /// Atomically remove and return a live entry, cancelling its expiry.
    ///
    /// An entry found past its expiry is removed, reported as expired, and not
    /// returned.
    pub async fn take(&self, correlation_id: &str) -> Option<PendingConfirmation> {
        let pending = {
            let mut entries = self.entries.write().await;
            entries.remove(correlation_id)?
        };
        pending.expiry.cancel();

        if pending.request.is_expired() {
            info!(correlation_id, "Pending confirmation expired before it was answered");
            self.audit.record(&AuditEvent::new(
                AuditEventKind::ConfirmationExpired,
                &pending.request,
            ));
            return None;
        }

        Some(pending)
    }

    /// Remove an entry and cancel its expiry. Returns whether it was present.
    pub async fn remove(&self, correlation_id: &str) -> bool {
        let removed = self.entries.write().await.remove(correlation_id);
        match removed {
            Some(pending) => {
                pending.expiry.cancel();
                true
            }
            None => false,
        }
    }

    /// All live entries, oldest first.
    pub async fn list_all(&self) -> Vec<PendingConfirmation> {
        let mut all: Vec<_> = self
            .entries
            .read()
            .await
            .values()
            .filter(|p| !p.request.is_expired())
            .cloned()
            .collect();
        all.sort_by(|a, b| {
            a.request
                .created_at
                .cmp(&b.request.created_at)
                .then_with(|| a.request.correlation_id.cmp(&b.request.correlation_id))
        });
        all
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> StoreStats {
        let live = self.list_all().await;
        let now = Utc::now();

        let mut by_severity = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        for pending in &live {
            let policy = &pending.request.policy;
            *by_severity
                .entry(policy.severity.as_str().to_string())
                .or_insert(0) += 1;
            *by_category.entry(policy.category.clone()).or_insert(0) += 1;
        }

        StoreStats {
            pending: live.len(),
            max_pending: self.max_pending,
            by_severity,
            by_category,
            oldest_age_secs: live
                .first()
                .map(|p| (now - p.request.created_at).num_seconds()),
        }
    }

    /// Drop every entry and cancel all expiry tasks. Returns the number of
    /// entries dropped.
    pub async fn clear(&self) -> usize {
        let drained: Vec<_> = self.entries.write().await.drain().collect();
        for (_, pending) in &drained {
            pending.expiry.cancel();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "Discarded pending confirmations");
        }
        drained.len()
    }
}

async fn expire_after(
    entries: Weak<RwLock<Entries>>,
    correlation_id: String,
    delay: std::time::Duration,
    audit: Arc<dyn AuditSink>,
) {
    tokio::time::sleep(delay).await;

    let Some(entries) = entries.upgrade() else {
        return;
    };
    let removed = entries.write().await.remove(&correlation_id);

    if let Some(pending) = removed {
        info!(
            correlation_id = %correlation_id,
            tool = %pending.request.tool_name,
            "Pending confirmation timed out"
        );
        audit.record(&AuditEvent::new(
            AuditEventKind::ConfirmationExpired,
            &pending.request,
        ));
    }
}
