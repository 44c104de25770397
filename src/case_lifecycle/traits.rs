// Collaborator interfaces consumed by the transition authority

use async_trait::async_trait;

use crate::case_lifecycle::errors::{LookupError, NotifyError, StorageError};
use crate::case_lifecycle::types::{ActorId, Case, CaseId, Grant, ProjectId, StatusChange};

/// Resolves an actor's grant for a project
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PermissionLookup: Send + Sync {
    /// `Ok(None)` when the actor is not a member of the project
    async fn resolve_grant(
        &self,
        actor: &ActorId,
        project: &ProjectId,
    ) -> Result<Option<Grant>, LookupError>;
}

/// Reports how many steps a case has
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StepInventory: Send + Sync {
    async fn count_steps(&self, case_id: &CaseId) -> Result<u64, StorageError>;
}

/// Receives every applied status change
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_status_changed(&self, change: &StatusChange) -> Result<(), NotifyError>;
}

/// Case persistence
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn load(&self, case_id: &CaseId) -> Result<Case, StorageError>;

    /// Write `case` if the stored version still equals `expected_version`.
    /// Returns the new version.
    async fn persist(&self, case: &Case, expected_version: u64) -> Result<u64, StorageError>;
}
