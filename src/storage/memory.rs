// In-memory workspace backing all three data collaborators

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::case_lifecycle::errors::{LookupError, StorageError};
use crate::case_lifecycle::traits::{CaseStore, PermissionLookup, StepInventory};
use crate::case_lifecycle::types::{ActorId, Case, CaseId, Grant, ProjectId};

/// Project membership with its resolved grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub actor: ActorId,
    pub project: ProjectId,
    pub grant: Grant,
}

/// Serializable view of a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    #[serde(default)]
    pub cases: Vec<Case>,
    /// Step counts by case; missing entries mean no steps
    #[serde(default)]
    pub steps: BTreeMap<CaseId, u64>,
    #[serde(default)]
    pub members: Vec<Membership>,
}

#[derive(Debug, Default)]
struct WorkspaceState {
    cases: HashMap<CaseId, Case>,
    steps: HashMap<CaseId, u64>,
    grants: HashMap<(ActorId, ProjectId), Grant>,
}

/// Cases, steps and grants held in process memory
#[derive(Debug, Default)]
pub struct InMemoryWorkspace {
    state: RwLock<WorkspaceState>,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: WorkspaceSnapshot) -> Self {
        let state = WorkspaceState {
            cases: snapshot.cases.into_iter().map(|case| (case.id, case)).collect(),
            steps: snapshot.steps.into_iter().collect(),
            grants: snapshot
                .members
                .into_iter()
                .map(|m| ((m.actor, m.project), m.grant))
                .collect(),
        };
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        let state = self.read();
        let mut cases: Vec<Case> = state.cases.values().cloned().collect();
        cases.sort_by_key(|case| case.id);
        let mut members: Vec<Membership> = state
            .grants
            .iter()
            .map(|((actor, project), grant)| Membership {
                actor: actor.clone(),
                project: *project,
                grant: grant.clone(),
            })
            .collect();
        members.sort_by(|a, b| (&a.actor, a.project).cmp(&(&b.actor, b.project)));
        WorkspaceSnapshot {
            cases,
            steps: state.steps.iter().map(|(id, n)| (*id, *n)).collect(),
            members,
        }
    }

    pub fn insert_case(&self, case: Case) {
        self.write().cases.insert(case.id, case);
    }

    pub fn case(&self, case_id: CaseId) -> Option<Case> {
        self.read().cases.get(&case_id).cloned()
    }

    pub fn set_steps(&self, case_id: CaseId, count: u64) {
        self.write().steps.insert(case_id, count);
    }

    pub fn grant(&self, actor: ActorId, project: ProjectId, grant: Grant) {
        self.write().grants.insert((actor, project), grant);
    }

    pub fn revoke(&self, actor: &ActorId, project: ProjectId) -> Option<Grant> {
        self.write().grants.remove(&(actor.clone(), project))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, WorkspaceState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, WorkspaceState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CaseStore for InMemoryWorkspace {
    async fn load(&self, case_id: &CaseId) -> Result<Case, StorageError> {
        self.case(*case_id).ok_or(StorageError::NotFound(*case_id))
    }

    async fn persist(&self, case: &Case, expected_version: u64) -> Result<u64, StorageError> {
        let mut state = self.write();
        let stored = state
            .cases
            .get_mut(&case.id)
            .ok_or(StorageError::NotFound(case.id))?;
        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                case_id: case.id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = Case {
            version: expected_version + 1,
            ..case.clone()
        };
        Ok(stored.version)
    }
}

#[async_trait]
impl StepInventory for InMemoryWorkspace {
    async fn count_steps(&self, case_id: &CaseId) -> Result<u64, StorageError> {
        Ok(self.read().steps.get(case_id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl PermissionLookup for InMemoryWorkspace {
    async fn resolve_grant(
        &self,
        actor: &ActorId,
        project: &ProjectId,
    ) -> Result<Option<Grant>, LookupError> {
        Ok(self.read().grants.get(&(actor.clone(), *project)).cloned())
    }
}
