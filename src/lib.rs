// casewarden - status workflow engine for test cases
// This exposes the core components for testing and integration

pub mod case_lifecycle;
pub mod config;
pub mod notify;
pub mod response;
pub mod storage;
pub mod telemetry;

// Re-export key types for easy access
pub use case_lifecycle::{
    ActorId, Capability, Case, CaseDraft, CaseId, CaseStatus, CaseType, Grant, PermissionLevel,
    ProjectId, StatusChange, StatusTransitionAuthority, TransitionError, TransitionReceipt,
    TransitionSettings,
};
pub use config::{config, init_config, CasewardenConfig, Locale};
pub use notify::{ChannelNotifier, TracingNotifier};
pub use response::StatusResponse;
pub use storage::{CachedPermissionLookup, InMemoryWorkspace, WorkspaceFile, WorkspaceSnapshot};
pub use telemetry::{create_transition_span, generate_correlation_id, init_telemetry};
