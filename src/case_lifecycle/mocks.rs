// Mock implementations for testing - no side effects

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::case_lifecycle::errors::*;
use crate::case_lifecycle::traits::*;
use crate::case_lifecycle::types::*;
use crate::storage::InMemoryWorkspace;

/// Grant lookup that counts how often it is asked
#[derive(Debug, Default)]
pub struct CountingLookup {
    grants: Mutex<HashMap<(ActorId, ProjectId), Grant>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl CountingLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_grant(&self, actor: &ActorId, project: ProjectId, grant: Grant) {
        self.grants
            .lock()
            .unwrap()
            .insert((actor.clone(), project), grant);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionLookup for CountingLookup {
    async fn resolve_grant(
        &self,
        actor: &ActorId,
        project: &ProjectId,
    ) -> Result<Option<Grant>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LookupError::Unavailable {
                project: *project,
                reason: "mock outage".to_string(),
            });
        }
        Ok(self
            .grants
            .lock()
            .unwrap()
            .get(&(actor.clone(), *project))
            .cloned())
    }
}

/// Notification sink that stores every change it receives
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    changes: Mutex<Vec<StatusChange>>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    /// Hold every notification for `delay` before recording it
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn changes(&self) -> Vec<StatusChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.changes.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify_status_changed(&self, change: &StatusChange) -> Result<(), NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.changes.lock().unwrap().push(change.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("webhook returned 502".to_string()));
        }
        Ok(())
    }
}

/// Store whose writes always fail; reads come from a real workspace
pub struct FailingStore {
    inner: Arc<InMemoryWorkspace>,
}

impl FailingStore {
    pub fn new(inner: Arc<InMemoryWorkspace>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CaseStore for FailingStore {
    async fn load(&self, case_id: &CaseId) -> Result<Case, StorageError> {
        self.inner.load(case_id).await
    }

    async fn persist(&self, _case: &Case, _expected_version: u64) -> Result<u64, StorageError> {
        Err(StorageError::Backend("connection reset".to_string()))
    }
}
