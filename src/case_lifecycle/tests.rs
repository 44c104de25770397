// Tests for the status transition authority

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::super::authority::*;
    use super::super::errors::*;
    use super::super::mocks::*;
    use super::super::traits::*;
    use super::super::types::*;
    use crate::storage::InMemoryWorkspace;

    const PROJECT: ProjectId = ProjectId(10);

    struct Fixture {
        workspace: Arc<InMemoryWorkspace>,
        notifier: Arc<RecordingNotifier>,
        authority: StatusTransitionAuthority,
    }

    fn fixture_with(notifier: RecordingNotifier, settings: TransitionSettings) -> Fixture {
        let workspace = Arc::new(InMemoryWorkspace::new());
        let notifier = Arc::new(notifier);
        let authority = StatusTransitionAuthority::new(
            workspace.clone(),
            workspace.clone(),
            workspace.clone(),
            notifier.clone(),
        )
        .with_settings(settings);
        Fixture {
            workspace,
            notifier,
            authority,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingNotifier::new(), TransitionSettings::default())
    }

    fn alice() -> ActorId {
        ActorId::new("alice")
    }

    impl Fixture {
        fn seed(&self, id: u64, case_type: CaseType, status: CaseStatus, steps: u64) -> CaseId {
            let case_id = CaseId(id);
            self.workspace
                .insert_case(Case::new(case_id, PROJECT, case_type).with_status(status));
            self.workspace.set_steps(case_id, steps);
            case_id
        }

        fn grant(&self, case: PermissionLevel, case_approve: PermissionLevel) {
            self.workspace
                .grant(alice(), PROJECT, Grant::with_levels(case, case_approve));
        }

        fn status(&self, case_id: CaseId) -> CaseStatus {
            self.workspace.case(case_id).unwrap().status
        }
    }

    #[tokio::test]
    async fn test_full_case_grant_moves_case_to_refinement() {
        let fx = fixture();
        fx.grant(PermissionLevel::Full, PermissionLevel::None);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Draft, 2);

        let receipt = fx
            .authority
            .change_status(&alice(), case_id, Some("refinement"))
            .await
            .unwrap();

        assert_eq!(receipt.previous, CaseStatus::Draft);
        assert_eq!(receipt.current, CaseStatus::Refinement);
        assert_eq!(receipt.version, 1);
        assert_eq!(receipt.notification, NotificationOutcome::Delivered);
        assert_eq!(fx.status(case_id), CaseStatus::Refinement);

        let changes = fx.notifier.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].actor, alice());
        assert_eq!(changes[0].previous, CaseStatus::Draft);
        assert_eq!(changes[0].current, CaseStatus::Refinement);
        assert_eq!(changes[0].project, PROJECT);
    }

    #[tokio::test]
    async fn test_approval_needs_case_approve_grant() {
        let fx = fixture();
        fx.grant(PermissionLevel::Full, PermissionLevel::None);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Draft, 2);

        let err = fx
            .authority
            .change_status(&alice(), case_id, Some("approved"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransitionError::Forbidden { target: CaseStatus::Approved }));
        assert_eq!(fx.status(case_id), CaseStatus::Draft);
        assert_eq!(fx.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_approval_without_steps_is_blocked() {
        let fx = fixture();
        fx.grant(PermissionLevel::Full, PermissionLevel::Full);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Draft, 0);

        let err = fx
            .authority
            .change_status(&alice(), case_id, Some("approved"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransitionError::StepsRequired { target: CaseStatus::Approved }));
        assert_eq!(fx.status(case_id), CaseStatus::Draft);
        assert_eq!(fx.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_task_can_be_approved_without_steps() {
        let fx = fixture();
        fx.grant(PermissionLevel::Full, PermissionLevel::Full);
        let case_id = fx.seed(1, CaseType::Task, CaseStatus::Draft, 0);

        let receipt = fx
            .authority
            .change_status(&alice(), case_id, Some("approved"))
            .await
            .unwrap();

        assert_eq!(receipt.current, CaseStatus::Approved);
        assert_eq!(fx.status(case_id), CaseStatus::Approved);
    }

    #[tokio::test]
    async fn test_actor_without_grant_is_forbidden_for_every_target() {
        let fx = fixture();
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Refinement, 3);

        for target in ["draft", "refinement", "approved"] {
            let err = fx
                .authority
                .change_status(&alice(), case_id, Some(target))
                .await
                .unwrap_err();
            assert!(matches!(err, TransitionError::Forbidden { .. }), "target {target}");
        }
        assert_eq!(fx.status(case_id), CaseStatus::Refinement);
        assert_eq!(fx.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_target_is_rejected_before_any_lookup() {
        let mut permissions = MockPermissionLookup::new();
        permissions.expect_resolve_grant().never();
        let mut store = MockCaseStore::new();
        store.expect_load().never();
        store.expect_persist().never();
        let mut steps = MockStepInventory::new();
        steps.expect_count_steps().never();
        let mut notifier = MockNotificationSink::new();
        notifier.expect_notify_status_changed().never();

        let authority = StatusTransitionAuthority::new(
            Arc::new(permissions),
            Arc::new(steps),
            Arc::new(store),
            Arc::new(notifier),
        );

        for requested in [Some(""), Some("done"), Some("untested"), None] {
            let err = authority
                .change_status(&alice(), CaseId(1), requested)
                .await
                .unwrap_err();
            assert!(
                matches!(err, TransitionError::InvalidTarget { .. }),
                "requested {requested:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_target_name_is_case_insensitive() {
        let fx = fixture();
        fx.grant(PermissionLevel::Update, PermissionLevel::None);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Draft, 1);

        fx.authority
            .change_status(&alice(), case_id, Some("REFINEMENT"))
            .await
            .unwrap();
        assert_eq!(fx.status(case_id), CaseStatus::Refinement);
    }

    #[tokio::test]
    async fn test_step_gate_applies_at_every_authorized_level() {
        for (case_level, target) in [
            (PermissionLevel::Update, "refinement"),
            (PermissionLevel::Full, "refinement"),
            (PermissionLevel::Full, "approved"),
        ] {
            let fx = fixture();
            fx.grant(case_level, PermissionLevel::Full);
            let case_id = fx.seed(1, CaseType::Case, CaseStatus::Draft, 0);

            let err = fx
                .authority
                .change_status(&alice(), case_id, Some(target))
                .await
                .unwrap_err();
            assert!(matches!(err, TransitionError::StepsRequired { .. }), "{case_level:?} -> {target}");
            assert_eq!(fx.status(case_id), CaseStatus::Draft);
        }
    }

    #[tokio::test]
    async fn test_reapproval_still_requires_approve_grant() {
        let fx = fixture();
        fx.grant(PermissionLevel::Full, PermissionLevel::Update);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Approved, 4);

        let err = fx
            .authority
            .change_status(&alice(), case_id, Some("approved"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::Forbidden { .. }));
        assert_eq!(fx.status(case_id), CaseStatus::Approved);
    }

    #[tokio::test]
    async fn test_update_grant_can_move_back_to_draft() {
        let fx = fixture();
        fx.grant(PermissionLevel::Update, PermissionLevel::None);
        let approved = fx.seed(1, CaseType::Case, CaseStatus::Approved, 2);
        let empty = fx.seed(2, CaseType::Case, CaseStatus::Refinement, 0);

        fx.authority
            .change_status(&alice(), approved, Some("draft"))
            .await
            .unwrap();
        fx.authority
            .change_status(&alice(), empty, Some("Draft"))
            .await
            .unwrap();

        assert_eq!(fx.status(approved), CaseStatus::Draft);
        assert_eq!(fx.status(empty), CaseStatus::Draft);
    }

    #[tokio::test]
    async fn test_reapplying_same_status_succeeds_and_notifies() {
        let fx = fixture();
        fx.grant(PermissionLevel::Full, PermissionLevel::None);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Draft, 1);

        let first = fx
            .authority
            .change_status(&alice(), case_id, Some("refinement"))
            .await
            .unwrap();
        let second = fx
            .authority
            .change_status(&alice(), case_id, Some("refinement"))
            .await
            .unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(second.previous, CaseStatus::Refinement);
        assert_eq!(second.current, CaseStatus::Refinement);
        assert_eq!(fx.status(case_id), CaseStatus::Refinement);
        assert_eq!(fx.notifier.count(), 2);
    }

    #[tokio::test]
    async fn test_reapply_notification_can_be_disabled() {
        let settings = TransitionSettings {
            notify_on_reapply: false,
            ..TransitionSettings::default()
        };
        let fx = fixture_with(RecordingNotifier::new(), settings);
        fx.grant(PermissionLevel::Full, PermissionLevel::None);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Draft, 1);

        fx.authority
            .change_status(&alice(), case_id, Some("draft"))
            .await
            .map(|receipt| assert_eq!(receipt.notification, NotificationOutcome::Skipped))
            .unwrap();
        assert_eq!(fx.notifier.count(), 0);
        assert_eq!(fx.workspace.case(case_id).unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_transition() {
        let fx = fixture_with(RecordingNotifier::failing(), TransitionSettings::default());
        fx.grant(PermissionLevel::Full, PermissionLevel::Full);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Refinement, 5);

        let receipt = fx
            .authority
            .change_status(&alice(), case_id, Some("approved"))
            .await
            .unwrap();

        assert!(matches!(receipt.notification, NotificationOutcome::Failed(_)));
        assert_eq!(fx.status(case_id), CaseStatus::Approved);
    }

    #[tokio::test]
    async fn test_persist_failure_leaves_case_unchanged() {
        let workspace = Arc::new(InMemoryWorkspace::new());
        workspace.insert_case(Case::new(CaseId(1), PROJECT, CaseType::Case));
        workspace.set_steps(CaseId(1), 1);
        workspace.grant(alice(), PROJECT, Grant::with_levels(PermissionLevel::Full, PermissionLevel::Full));
        let notifier = Arc::new(RecordingNotifier::new());
        let authority = StatusTransitionAuthority::new(
            workspace.clone(),
            workspace.clone(),
            Arc::new(FailingStore::new(workspace.clone())),
            notifier.clone(),
        );

        let err = authority
            .change_status(&alice(), CaseId(1), Some("approved"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransitionError::Storage(StorageError::Backend(_))));
        assert!(!err.is_client_error());
        assert_eq!(workspace.case(CaseId(1)).unwrap().status, CaseStatus::Draft);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_case() {
        let fx = fixture();
        fx.grant(PermissionLevel::Full, PermissionLevel::Full);

        let err = fx
            .authority
            .change_status(&alice(), CaseId(404), Some("draft"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::CaseNotFound(CaseId(404))));
    }

    #[tokio::test]
    async fn test_lookup_outage_surfaces_as_server_error() {
        let workspace = Arc::new(InMemoryWorkspace::new());
        workspace.insert_case(Case::new(CaseId(1), PROJECT, CaseType::Case));
        let lookup = Arc::new(CountingLookup::new());
        lookup.set_unavailable(true);
        let authority = StatusTransitionAuthority::new(
            lookup.clone(),
            workspace.clone(),
            workspace.clone(),
            Arc::new(RecordingNotifier::new()),
        );

        let err = authority
            .change_status(&alice(), CaseId(1), Some("draft"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::PermissionLookup(_)));
        assert_eq!(lookup.calls(), 1);
        assert_eq!(workspace.case(CaseId(1)).unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_steps_are_not_counted_for_tasks_or_drafts() {
        let workspace = Arc::new(InMemoryWorkspace::new());
        workspace.insert_case(Case::new(CaseId(1), PROJECT, CaseType::Task));
        workspace.insert_case(Case::new(CaseId(2), PROJECT, CaseType::Case));
        workspace.grant(alice(), PROJECT, Grant::with_levels(PermissionLevel::Full, PermissionLevel::Full));
        let mut steps = MockStepInventory::new();
        steps.expect_count_steps().never();
        let authority = StatusTransitionAuthority::new(
            workspace.clone(),
            Arc::new(steps),
            workspace.clone(),
            Arc::new(RecordingNotifier::new()),
        );

        authority.change_status(&alice(), CaseId(1), Some("approved")).await.unwrap();
        authority.change_status(&alice(), CaseId(2), Some("draft")).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_transitions_are_serialized() {
        let fx = fixture_with(
            RecordingNotifier::slow(Duration::from_millis(20)),
            TransitionSettings::default(),
        );
        fx.grant(PermissionLevel::Full, PermissionLevel::Full);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Draft, 1);

        let actor = alice();
        let (a, b) = tokio::join!(
            fx.authority.change_status(&actor, case_id, Some("refinement")),
            fx.authority.change_status(&actor, case_id, Some("approved")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let mut versions = [a.version, b.version];
        versions.sort();
        assert_eq!(versions, [1, 2]);
        // the later writer saw the earlier writer's status
        let (first, second) = if a.version < b.version { (a, b) } else { (b, a) };
        assert_eq!(second.previous, first.current);
        assert_eq!(fx.notifier.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_timeout_reports_busy() {
        let settings = TransitionSettings {
            lock_timeout: Duration::from_millis(10),
            ..TransitionSettings::default()
        };
        let fx = fixture_with(RecordingNotifier::slow(Duration::from_millis(200)), settings);
        fx.grant(PermissionLevel::Full, PermissionLevel::None);
        let case_id = fx.seed(1, CaseType::Case, CaseStatus::Draft, 1);

        let actor = alice();
        let (first, second) = tokio::join!(
            fx.authority.change_status(&actor, case_id, Some("refinement")),
            async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                fx.authority.change_status(&actor, case_id, Some("draft")).await
            },
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(TransitionError::Busy(id)) if id == case_id));
        assert_eq!(fx.status(case_id), CaseStatus::Refinement);
    }

    #[tokio::test]
    async fn test_create_defaults_to_draft() {
        let fx = fixture();
        let status = fx
            .authority
            .validate_create(&alice(), &CaseDraft::default())
            .await
            .unwrap();
        assert_eq!(status, CaseStatus::Draft);
    }

    #[tokio::test]
    async fn test_create_checks_steps_before_rights() {
        let fx = fixture();
        let draft = CaseDraft {
            project: Some(PROJECT),
            status: Some("approved".to_string()),
            ..CaseDraft::default()
        };

        let err = fx.authority.validate_create(&alice(), &draft).await.unwrap_err();
        assert!(matches!(err, TransitionError::StepsRequired { .. }));

        let with_steps = CaseDraft { steps: 2, ..draft };
        let err = fx.authority.validate_create(&alice(), &with_steps).await.unwrap_err();
        assert!(matches!(err, TransitionError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_create_approved_case() {
        let fx = fixture();
        fx.grant(PermissionLevel::None, PermissionLevel::Full);

        let task = CaseDraft {
            project: Some(PROJECT),
            case_type: Some(CaseType::Task),
            status: Some("Approved".to_string()),
            steps: 0,
        };
        assert_eq!(
            fx.authority.validate_create(&alice(), &task).await.unwrap(),
            CaseStatus::Approved
        );

        let no_project = CaseDraft { project: None, ..task };
        assert!(matches!(
            fx.authority.validate_create(&alice(), &no_project).await,
            Err(TransitionError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_refinement_only_needs_steps() {
        let fx = fixture();
        let draft = CaseDraft {
            status: Some("refinement".to_string()),
            steps: 1,
            ..CaseDraft::default()
        };
        assert_eq!(
            fx.authority.validate_create(&alice(), &draft).await.unwrap(),
            CaseStatus::Refinement
        );

        let unknown = CaseDraft {
            status: Some("archived".to_string()),
            ..CaseDraft::default()
        };
        assert!(matches!(
            fx.authority.validate_create(&alice(), &unknown).await,
            Err(TransitionError::InvalidTarget { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_skips_approval_check_for_approved_case() {
        let fx = fixture();
        fx.grant(PermissionLevel::Update, PermissionLevel::None);
        let approved = Case::new(CaseId(1), PROJECT, CaseType::Case).with_status(CaseStatus::Approved);
        let refining = Case::new(CaseId(2), PROJECT, CaseType::Case).with_status(CaseStatus::Refinement);
        let draft = CaseDraft {
            status: Some("approved".to_string()),
            steps: 3,
            ..CaseDraft::default()
        };

        assert_eq!(
            fx.authority.validate_update(&alice(), &approved, &draft).await.unwrap(),
            CaseStatus::Approved
        );
        assert!(matches!(
            fx.authority.validate_update(&alice(), &refining, &draft).await,
            Err(TransitionError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_reads_type_from_form_and_project_from_case() {
        let fx = fixture();
        fx.grant(PermissionLevel::Full, PermissionLevel::Full);
        let task = Case::new(CaseId(1), PROJECT, CaseType::Task);
        let draft = CaseDraft {
            status: Some("approved".to_string()),
            ..CaseDraft::default()
        };

        // no type in the form means a regular case, even for a stored task
        assert!(matches!(
            fx.authority.validate_update(&alice(), &task, &draft).await,
            Err(TransitionError::StepsRequired { .. })
        ));

        // project comes from the stored case, so the grant still applies
        let as_task = CaseDraft {
            case_type: Some(CaseType::Task),
            ..draft
        };
        assert_eq!(
            fx.authority.validate_update(&alice(), &task, &as_task).await.unwrap(),
            CaseStatus::Approved
        );
    }
}
