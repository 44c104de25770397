// Status transition authority: validates, applies and announces case status changes

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tracing::{debug, info, warn, Instrument};

use crate::case_lifecycle::errors::{StorageError, TransitionError};
use crate::case_lifecycle::locks::CaseLocks;
use crate::case_lifecycle::table::{self, Route};
use crate::case_lifecycle::traits::{CaseStore, NotificationSink, PermissionLookup, StepInventory};
use crate::case_lifecycle::types::*;
use crate::config::WorkflowConfig;
use crate::telemetry::{create_transition_span, generate_correlation_id};

/// Runtime knobs of the authority
#[derive(Debug, Clone)]
pub struct TransitionSettings {
    pub notify_on_reapply: bool,
    pub lock_timeout: Duration,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

impl From<&WorkflowConfig> for TransitionSettings {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            notify_on_reapply: config.notify_on_reapply,
            lock_timeout: config.lock_timeout(),
        }
    }
}

/// Decides and applies case status transitions
pub struct StatusTransitionAuthority {
    permissions: Arc<dyn PermissionLookup>,
    steps: Arc<dyn StepInventory>,
    store: Arc<dyn CaseStore>,
    notifier: Arc<dyn NotificationSink>,
    locks: CaseLocks,
    settings: TransitionSettings,
}

impl StatusTransitionAuthority {
    pub fn new(
        permissions: Arc<dyn PermissionLookup>,
        steps: Arc<dyn StepInventory>,
        store: Arc<dyn CaseStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            permissions,
            steps,
            store,
            notifier,
            locks: CaseLocks::new(),
            settings: TransitionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: TransitionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &TransitionSettings {
        &self.settings
    }

    /// Move a case to the requested status.
    ///
    /// Evaluation order: target name, case lock, grant, step gate, persist,
    /// notify. Nothing is written unless every check passes, and a failed
    /// notification does not undo the persisted change.
    pub async fn change_status(
        &self,
        actor: &ActorId,
        case_id: CaseId,
        requested: Option<&str>,
    ) -> Result<TransitionReceipt, TransitionError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(
            "change_status",
            Some(case_id.0),
            actor.as_str(),
            &correlation_id,
        );

        async move {
            let route = table::parse_target(requested).inspect_err(|e| {
                debug!(requested = ?requested, error = %e, "Rejected status name");
            })?;

            let _guard = self.locks.acquire(case_id, self.settings.lock_timeout).await?;
            let case = self.store.load(&case_id).await.map_err(|e| match e {
                StorageError::NotFound(id) => TransitionError::CaseNotFound(id),
                other => TransitionError::Storage(other),
            })?;

            self.check_transition(actor, &case, route).await?;
            self.apply(actor, case, route.target, correlation_id)
                .await
        }
        .instrument(span)
        .await
    }

    /// Validate the status submitted with a new-case form.
    /// Returns the status the case will be created with.
    pub async fn validate_create(
        &self,
        actor: &ActorId,
        draft: &CaseDraft,
    ) -> Result<CaseStatus, TransitionError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span("validate_create", None, actor.as_str(), &correlation_id);
        self.validate_form(
            actor,
            draft.project,
            draft.case_type.unwrap_or_default(),
            draft,
            false,
        )
        .instrument(span)
        .await
    }

    /// Validate the status submitted with an edit form for `existing`.
    /// Approval rights are only checked when the case is not approved yet.
    /// The project falls back to the stored case; type and steps come from the form.
    pub async fn validate_update(
        &self,
        actor: &ActorId,
        existing: &Case,
        draft: &CaseDraft,
    ) -> Result<CaseStatus, TransitionError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(
            "validate_update",
            Some(existing.id.0),
            actor.as_str(),
            &correlation_id,
        );
        self.validate_form(
            actor,
            draft.project.or(Some(existing.project)),
            draft.case_type.unwrap_or_default(),
            draft,
            existing.status == CaseStatus::Approved,
        )
        .instrument(span)
        .await
    }

    async fn validate_form(
        &self,
        actor: &ActorId,
        project: Option<ProjectId>,
        case_type: CaseType,
        draft: &CaseDraft,
        already_approved: bool,
    ) -> Result<CaseStatus, TransitionError> {
        let route = table::parse_target(Some(draft.status.as_deref().unwrap_or("draft")))?;

        // Forms check steps before rights
        if !table::passes_step_gate(case_type, draft.steps as u64, route.target) {
            debug!(target_status = %route.target, "Form submitted without steps");
            return Err(TransitionError::StepsRequired { target: route.target });
        }

        if route.target == CaseStatus::Approved && !already_approved {
            let grant = match project {
                Some(project) => self.permissions.resolve_grant(actor, &project).await?,
                None => None,
            };
            if !table::authorize(route, grant.as_ref()) {
                warn!(actor = %actor, project = ?project, "Approval denied on form submit");
                return Err(TransitionError::Forbidden { target: route.target });
            }
        }

        Ok(route.target)
    }

    async fn check_transition(
        &self,
        actor: &ActorId,
        case: &Case,
        route: &Route,
    ) -> Result<(), TransitionError> {
        let grant = self.permissions.resolve_grant(actor, &case.project).await?;
        if !table::authorize(route, grant.as_ref()) {
            warn!(
                actor = %actor,
                project = %case.project,
                target_status = %route.target,
                has_grant = grant.is_some(),
                "Transition forbidden"
            );
            return Err(TransitionError::Forbidden { target: route.target });
        }

        if table::needs_step_count(case.case_type, route.target) {
            let steps = self.steps.count_steps(&case.id).await?;
            if !table::passes_step_gate(case.case_type, steps, route.target) {
                info!(target_status = %route.target, "Transition blocked: case has no steps");
                return Err(TransitionError::StepsRequired { target: route.target });
            }
        }
        Ok(())
    }

    async fn apply(
        &self,
        actor: &ActorId,
        mut case: Case,
        target: CaseStatus,
        correlation_id: String,
    ) -> Result<TransitionReceipt, TransitionError> {
        let previous = case.status;
        let expected_version = case.version;
        case.status = target;

        let version = self
            .store
            .persist(&case, expected_version)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to persist status change"))?;

        let change = StatusChange {
            actor: actor.clone(),
            case_id: case.id,
            project: case.project,
            previous,
            current: target,
            changed_at: Utc::now(),
            correlation_id,
        };
        let notification = self.dispatch(&change).await;

        info!(
            previous = %previous,
            current = %target,
            version = version,
            "Case status changed"
        );

        Ok(TransitionReceipt {
            case_id: case.id,
            previous,
            current: target,
            version,
            notification,
        })
    }

    async fn dispatch(&self, change: &StatusChange) -> NotificationOutcome {
        if change.is_reapply() && !self.settings.notify_on_reapply {
            debug!(status = %change.current, "Status unchanged, notification skipped");
            return NotificationOutcome::Skipped;
        }

        match self.notifier.notify_status_changed(change).await {
            Ok(()) => NotificationOutcome::Delivered,
            Err(e) => {
                warn!(error = %e, "Status change notification failed");
                NotificationOutcome::Failed(e.to_string())
            }
        }
    }
}
