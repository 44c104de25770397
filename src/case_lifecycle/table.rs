// Transition table and pure decision functions.
//
// Nothing here touches storage, so every rule can be exercised directly.

use crate::case_lifecycle::errors::TransitionError;
use crate::case_lifecycle::types::{Capability, Case, CaseStatus, CaseType, Grant, PermissionLevel};

/// One row of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub capability: Capability,
    /// Levels of `capability` that authorize the route
    pub accepted: &'static [PermissionLevel],
    pub target: CaseStatus,
}

pub const TRANSITIONS: [Route; 3] = [
    Route {
        name: "draft",
        capability: Capability::Case,
        accepted: &[PermissionLevel::Full, PermissionLevel::Update],
        target: CaseStatus::Draft,
    },
    Route {
        name: "approved",
        capability: Capability::CaseApprove,
        accepted: &[PermissionLevel::Full],
        target: CaseStatus::Approved,
    },
    Route {
        name: "refinement",
        capability: Capability::Case,
        accepted: &[PermissionLevel::Full, PermissionLevel::Update],
        target: CaseStatus::Refinement,
    },
];

/// Resolve a requested status name to its route. Matching is
/// case-insensitive; surrounding whitespace is not stripped.
pub fn parse_target(requested: Option<&str>) -> Result<&'static Route, TransitionError> {
    let Some(name) = requested else {
        return Err(TransitionError::InvalidTarget { requested: None });
    };
    let normalized = name.to_lowercase();
    TRANSITIONS
        .iter()
        .find(|route| route.name == normalized)
        .ok_or_else(|| TransitionError::InvalidTarget {
            requested: Some(name.to_string()),
        })
}

/// An absent grant never authorizes anything.
pub fn authorize(route: &Route, grant: Option<&Grant>) -> bool {
    grant
        .map(|grant| route.accepted.contains(&grant.level(route.capability)))
        .unwrap_or(false)
}

/// Step gate: non-task cases need at least one step for statuses past draft.
pub fn passes_step_gate(case_type: CaseType, step_count: u64, target: CaseStatus) -> bool {
    case_type.is_task() || step_count > 0 || !target.requires_steps()
}

/// Whether the step count is needed to decide this transition
pub fn needs_step_count(case_type: CaseType, target: CaseStatus) -> bool {
    !case_type.is_task() && target.requires_steps()
}

/// Full decision for a transition request, in evaluation order:
/// target name, authorization, step gate.
pub fn decide(
    requested: Option<&str>,
    case: &Case,
    grant: Option<&Grant>,
    step_count: u64,
) -> Result<CaseStatus, TransitionError> {
    let route = parse_target(requested)?;
    if !authorize(route, grant) {
        return Err(TransitionError::Forbidden {
            target: route.target,
        });
    }
    if !passes_step_gate(case.case_type, step_count, route.target) {
        return Err(TransitionError::StepsRequired {
            target: route.target,
        });
    }
    Ok(route.target)
}
