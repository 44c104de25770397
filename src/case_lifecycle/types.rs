// Core types for the case status workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub u64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the project owning a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the user requesting a change
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of test case. Tasks carry no steps and skip the step gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseType {
    #[default]
    Case,
    Task,
}

impl CaseType {
    pub fn is_task(&self) -> bool {
        matches!(self, CaseType::Task)
    }
}

/// Lifecycle status of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    /// Set by run ingestion; never a transition target
    Untested,
    #[default]
    Draft,
    Refinement,
    Approved,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Untested => "untested",
            CaseStatus::Draft => "draft",
            CaseStatus::Refinement => "refinement",
            CaseStatus::Approved => "approved",
        }
    }

    /// Statuses a non-task case may only hold once it has steps
    pub fn requires_steps(&self) -> bool {
        matches!(self, CaseStatus::Refinement | CaseStatus::Approved)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test case as seen by the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub project: ProjectId,
    #[serde(default)]
    pub case_type: CaseType,
    #[serde(default)]
    pub status: CaseStatus,
    /// Bumped on every successful persist
    #[serde(default)]
    pub version: u64,
}

impl Case {
    pub fn new(id: CaseId, project: ProjectId, case_type: CaseType) -> Self {
        Self {
            id,
            project,
            case_type,
            status: CaseStatus::Draft,
            version: 0,
        }
    }

    pub fn with_status(mut self, status: CaseStatus) -> Self {
        self.status = status;
        self
    }
}

/// Capability keys consulted by the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// General case editing
    Case,
    /// Moving cases into APPROVED
    CaseApprove,
}

impl Capability {
    pub fn key(&self) -> &'static str {
        match self {
            Capability::Case => "case",
            Capability::CaseApprove => "case_approve",
        }
    }
}

/// Level held for a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    None,
    Update,
    Full,
}

/// Capability levels an actor holds for one project
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grant {
    levels: BTreeMap<Capability, PermissionLevel>,
}

impl Grant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant with the two capabilities the workflow cares about
    pub fn with_levels(case: PermissionLevel, case_approve: PermissionLevel) -> Self {
        Self::new()
            .with(Capability::Case, case)
            .with(Capability::CaseApprove, case_approve)
    }

    pub fn with(mut self, capability: Capability, level: PermissionLevel) -> Self {
        self.levels.insert(capability, level);
        self
    }

    /// Missing capabilities read as `None`
    pub fn level(&self, capability: Capability) -> PermissionLevel {
        self.levels.get(&capability).copied().unwrap_or_default()
    }
}

/// Payload handed to the notification sink after a transition lands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub actor: ActorId,
    pub case_id: CaseId,
    pub project: ProjectId,
    pub previous: CaseStatus,
    pub current: CaseStatus,
    pub changed_at: DateTime<Utc>,
    pub correlation_id: String,
}

impl StatusChange {
    pub fn is_reapply(&self) -> bool {
        self.previous == self.current
    }
}

/// What happened to the notification of an applied transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Delivered,
    Skipped,
    Failed(String),
}

/// Result of a successful transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReceipt {
    pub case_id: CaseId,
    pub previous: CaseStatus,
    pub current: CaseStatus,
    pub version: u64,
    pub notification: NotificationOutcome,
}

/// Status-bearing fields of a case create or update form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDraft {
    pub project: Option<ProjectId>,
    pub case_type: Option<CaseType>,
    pub status: Option<String>,
    /// Number of steps submitted with the form
    #[serde(default)]
    pub steps: usize,
}
