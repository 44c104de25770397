use thiserror::Error;

use crate::case_lifecycle::types::{CaseId, CaseStatus, ProjectId};

/// Why a transition was refused or could not be applied
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("{}", describe_target(.requested))]
    InvalidTarget { requested: Option<String> },
    #[error("actor lacks permission to set status {target}")]
    Forbidden { target: CaseStatus },
    #[error("case has no steps and cannot be set to {target}")]
    StepsRequired { target: CaseStatus },
    #[error("case {0} not found")]
    CaseNotFound(CaseId),
    #[error("case {0} is locked by another transition")]
    Busy(CaseId),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    PermissionLookup(#[from] LookupError),
}

impl TransitionError {
    /// Errors the caller caused; retrying the same request cannot succeed
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TransitionError::InvalidTarget { .. }
                | TransitionError::Forbidden { .. }
                | TransitionError::StepsRequired { .. }
                | TransitionError::CaseNotFound(_)
        )
    }
}

fn describe_target(requested: &Option<String>) -> String {
    match requested {
        Some(name) => format!("unknown status '{name}'"),
        None => "status is missing".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("case {0} does not exist")]
    NotFound(CaseId),
    #[error("case {case_id} was modified concurrently: expected version {expected}, found {actual}")]
    VersionConflict {
        case_id: CaseId,
        expected: u64,
        actual: u64,
    },
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("permission backend unavailable for project {project}: {reason}")]
    Unavailable { project: ProjectId, reason: String },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    ChannelClosed,
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}
