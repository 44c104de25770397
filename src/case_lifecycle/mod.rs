// Case Lifecycle Module - status workflow for test cases
//
// The transition table and decision rules are pure; the authority wires them
// to injected collaborators for grants, steps, storage and notifications.

pub mod types;
pub mod errors;
pub mod table;
pub mod traits;
pub mod locks;
pub mod authority;

#[cfg(test)]
pub mod mocks;

#[cfg(test)]
pub mod tests;

pub use types::{
    ActorId, Capability, Case, CaseDraft, CaseId, CaseStatus, CaseType, Grant,
    NotificationOutcome, PermissionLevel, ProjectId, StatusChange, TransitionReceipt,
};
pub use errors::{LookupError, NotifyError, StorageError, TransitionError};
pub use traits::{CaseStore, NotificationSink, PermissionLookup, StepInventory};
pub use authority::{StatusTransitionAuthority, TransitionSettings};
