//! Scenario tests for pipeline execution.

#[cfg(test)]
mod tests {
    use crate::collaborators::MockExistenceOracle;
    use crate::core::{ConfirmationDecision, ResultKind, StageOutcome, StageOutput};
    use crate::errors::{CollaboratorError, ProvisionError, EXIT_FAILURE, EXIT_SUCCESS};
    use crate::pipeline::{
        ConfirmationGate, ExistenceBranch, GateOptions, ParallelGroup, PipelineBuilder, Step,
        DECLINED_REASON,
    };
    use crate::stages::{FnStage, Stage};
    use crate::testing::{
        collecting_context, container_unit, release_unit, test_context, ExecutionLog, FailingStage,
        RecordingStage, ScriptedPrompter, SlowStage, workspace_unit,
    };
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn gate(auto_approve: bool, prompter: Arc<ScriptedPrompter>) -> ConfirmationGate {
        ConfirmationGate::new("confirm-push", "push web:1.0", GateOptions { auto_approve }, prompter)
    }

    #[tokio::test]
    async fn test_steps_run_in_declaration_order() {
        let log = ExecutionLog::default();
        let stage = |name: &str| -> Arc<dyn Stage> {
            Arc::new(RecordingStage::new(name).with_log(log.clone()))
        };

        let pipeline = PipelineBuilder::new("ordered")
            .stage(stage("init"))
            .stage(stage("plan"))
            .stage(stage("apply"))
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(container_unit())).await;

        assert!(outcome.is_success());
        assert_eq!(*log.lock(), vec!["init", "plan", "apply"]);
    }

    #[tokio::test]
    async fn test_failure_stops_later_steps() {
        let after = Arc::new(RecordingStage::new("push"));
        let group_member = Arc::new(RecordingStage::new("scan"));

        let pipeline = PipelineBuilder::new("fail-fast")
            .stage(Arc::new(RecordingStage::new("init")))
            .stage(Arc::new(FailingStage::new("build", "daemon not running")))
            .group(ParallelGroup::new("verify").member(group_member.clone()))
            .stage(after.clone())
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(container_unit())).await;

        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
        assert_eq!(after.call_count(), 0);
        assert_eq!(group_member.call_count(), 0);
        assert!(outcome.run.result("push").is_none());
        assert!(outcome.run.result("verify").is_none());
        assert!(matches!(
            outcome.error,
            Some(ProvisionError::Collaborator { ref stage, .. }) if stage == "build"
        ));
    }

    #[tokio::test]
    async fn test_group_failure_is_reported_after_join_and_stops_spine() {
        let tag = Arc::new(RecordingStage::new("tag"));
        let push = Arc::new(RecordingStage::new("push"));

        let pipeline = PipelineBuilder::new("container")
            .group(
                ParallelGroup::new("verify")
                    .member(Arc::new(FailingStage::new("scan", "scanner unavailable")))
                    .member(tag.clone()),
            )
            .stage(push.clone())
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(container_unit())).await;

        assert_eq!(tag.call_count(), 1);
        assert_eq!(outcome.run.outcome_of("tag"), Some(StageOutcome::Success));
        assert_eq!(outcome.run.outcome_of("scan"), Some(StageOutcome::Failed));
        assert_eq!(push.call_count(), 0);

        let Some(ProvisionError::Aggregated(err)) = outcome.error else {
            panic!("expected aggregated error");
        };
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].stage, "scan");
    }

    #[tokio::test]
    async fn test_auto_approve_never_prompts() {
        let prompter = Arc::new(ScriptedPrompter::answering(false));
        let push = Arc::new(RecordingStage::new("push"));

        let pipeline = PipelineBuilder::new("container")
            .group(
                ParallelGroup::new("verify")
                    .member(Arc::new(RecordingStage::new("tag")))
                    .member(Arc::new(RecordingStage::new("scan"))),
            )
            .gate(gate(true, prompter.clone()))
            .gated(push.clone() as Arc<dyn Stage>)
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(container_unit())).await;

        assert!(outcome.is_success());
        assert_eq!(prompter.prompt_count(), 0);
        assert_eq!(push.call_count(), 1);
        assert_eq!(outcome.run.confirmation, Some(ConfirmationDecision::AutoApproved));
        assert_eq!(
            push.observed_decisions(),
            vec![Some(ConfirmationDecision::AutoApproved)]
        );
    }

    #[tokio::test]
    async fn test_declined_confirmation_skips_push_and_delete() {
        let prompter = Arc::new(ScriptedPrompter::answering(false));
        let push = Arc::new(RecordingStage::new("push"));
        let delete = Arc::new(RecordingStage::new("remove-local"));

        let pipeline = PipelineBuilder::new("container")
            .stage(Arc::new(RecordingStage::new("build")))
            .gate(gate(false, prompter.clone()))
            .gated(push.clone() as Arc<dyn Stage>)
            .gated(delete.clone() as Arc<dyn Stage>)
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(container_unit())).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert_eq!(prompter.prompt_count(), 1);
        assert_eq!(push.call_count() + delete.call_count(), 0);
        for name in ["push", "remove-local"] {
            let result = outcome.run.result(name).unwrap();
            assert!(result.is_skipped());
            assert_eq!(result.skip_reason.as_deref(), Some(DECLINED_REASON));
        }
        assert_eq!(outcome.run.confirmation, Some(ConfirmationDecision::UserDeclined));
    }

    #[tokio::test]
    async fn test_unanswerable_prompt_fails_run() {
        let prompter = Arc::new(ScriptedPrompter::failing("not a terminal"));
        let apply = Arc::new(RecordingStage::new("apply"));

        let pipeline = PipelineBuilder::new("infra")
            .stage(Arc::new(RecordingStage::new("plan")))
            .gate(gate(false, prompter.clone()))
            .gated(apply.clone() as Arc<dyn Stage>)
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(workspace_unit())).await;

        assert!(matches!(outcome.error, Some(ProvisionError::Prompt(_))));
        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
        assert_eq!(apply.call_count(), 0);
        assert!(outcome.run.result("apply").is_none());
        assert_eq!(outcome.run.outcome_of("confirm-push"), Some(StageOutcome::Failed));
        assert_eq!(outcome.run.confirmation, None);
    }

    #[tokio::test]
    async fn test_decision_is_computed_once_per_run() {
        let prompter = Arc::new(ScriptedPrompter::answering(true));
        let apply = Arc::new(RecordingStage::new("apply"));
        let output = Arc::new(RecordingStage::new("output"));

        let pipeline = PipelineBuilder::new("infra")
            .gate(gate(false, prompter.clone()))
            .gated(apply.clone() as Arc<dyn Stage>)
            .gate(ConfirmationGate::new(
                "confirm-again",
                "read outputs",
                GateOptions::default(),
                prompter.clone(),
            ))
            .gated(ParallelGroup::new("outputs").member(output.clone()))
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(container_unit())).await;

        assert!(outcome.is_success());
        assert_eq!(prompter.prompt_count(), 1);
        assert_eq!(output.call_count(), 1);
        assert_eq!(
            outcome.run.result("confirm-again").unwrap().data["decision"],
            serde_json::json!("user_approved")
        );
    }

    #[tokio::test]
    async fn test_declined_gated_group_skips_every_member() {
        let pipeline = PipelineBuilder::new("infra")
            .gate(gate(false, Arc::new(ScriptedPrompter::answering(false))))
            .gated(
                ParallelGroup::new("outputs")
                    .member(Arc::new(RecordingStage::new("output")))
                    .member(Arc::new(RecordingStage::new("graph"))),
            )
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(container_unit())).await;

        assert!(outcome.is_success());
        let skipped: Vec<_> = outcome
            .run
            .results()
            .iter()
            .filter(|r| r.is_skipped())
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(skipped, vec!["output", "graph", "outputs"]);
        assert_eq!(outcome.run.result("outputs").unwrap().kind, ResultKind::Group);
    }

    #[tokio::test]
    async fn test_scan_failure_with_declining_user() {
        // Build ok, scan fails, tag ok, user would decline: failed run, push never attempted.
        let prompter = Arc::new(ScriptedPrompter::answering(false));
        let build = Arc::new(RecordingStage::new("build"));
        let tag = Arc::new(RecordingStage::new("tag"));
        let push = Arc::new(RecordingStage::new("push"));

        let pipeline = PipelineBuilder::new("container")
            .stage(build.clone())
            .group(
                ParallelGroup::new("verify")
                    .member(Arc::new(FailingStage::new("scan", "scanner unavailable")))
                    .member(tag.clone()),
            )
            .gate(gate(false, prompter.clone()))
            .gated(push.clone() as Arc<dyn Stage>)
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(container_unit())).await;

        assert_eq!(outcome.outcome(), StageOutcome::Failed);
        assert_ne!(outcome.exit_code(), EXIT_SUCCESS);
        assert_eq!(build.call_count(), 1);
        assert_eq!(tag.call_count(), 1);
        assert_eq!(push.call_count(), 0);
        assert_eq!(prompter.prompt_count(), 0);
        let error = outcome.error.unwrap();
        assert_eq!(error.stages(), vec!["scan"]);
        assert!(error.to_string().contains("scan: scanner unavailable"));
    }

    fn release_branch(
        oracle: MockExistenceOracle,
        installs: Arc<AtomicUsize>,
        upgrade: Arc<RecordingStage>,
        install: Arc<RecordingStage>,
    ) -> ExistenceBranch {
        ExistenceBranch::new(
            "release-exists",
            Arc::new(oracle),
            Box::new(move || upgrade.clone() as Arc<dyn Stage>),
            Box::new(move || {
                installs.fetch_add(1, Ordering::SeqCst);
                install.clone() as Arc<dyn Stage>
            }),
        )
    }

    #[tokio::test]
    async fn test_existing_release_is_upgraded() {
        let mut oracle = MockExistenceOracle::new();
        oracle
            .expect_exists()
            .withf(|unit, _| unit.name == "web" && unit.namespace() == Some("prod"))
            .times(1)
            .returning(|_, _| Ok(true));
        let constructed = Arc::new(AtomicUsize::new(0));
        let upgrade = Arc::new(RecordingStage::new("upgrade"));
        let install = Arc::new(RecordingStage::new("install"));
        let lint = Arc::new(RecordingStage::new("lint"));

        let pipeline = PipelineBuilder::new("chart")
            .branch(release_branch(oracle, constructed.clone(), upgrade.clone(), install.clone()))
            .group(ParallelGroup::new("validate").member(lint.clone()))
            .build()
            .unwrap();

        let (ctx, sink) = collecting_context(release_unit());
        let outcome = pipeline.run(ctx).await;

        assert!(outcome.is_success());
        assert_eq!(upgrade.call_count(), 1);
        assert_eq!(install.call_count(), 0);
        assert_eq!(constructed.load(Ordering::SeqCst), 0);
        assert_eq!(lint.call_count(), 1);

        let check = outcome.run.result("release-exists").unwrap();
        assert_eq!(check.kind, ResultKind::Check);
        assert_eq!(check.data["selected"], serde_json::json!("upgrade"));
        assert_eq!(sink.events_of_type("existence.checked").len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_existence_aborts_before_install_or_upgrade() {
        let mut oracle = MockExistenceOracle::new();
        oracle
            .expect_exists()
            .times(1)
            .returning(|_, _| Err(CollaboratorError::other("Kubernetes cluster unreachable")));
        let upgrade = Arc::new(RecordingStage::new("upgrade"));
        let install = Arc::new(RecordingStage::new("install"));
        let lint = Arc::new(RecordingStage::new("lint"));

        let pipeline = PipelineBuilder::new("chart")
            .branch(release_branch(oracle, Arc::default(), upgrade.clone(), install.clone()))
            .group(ParallelGroup::new("validate").member(lint.clone()))
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(release_unit())).await;

        assert_eq!(upgrade.call_count() + install.call_count() + lint.call_count(), 0);
        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
        assert!(matches!(outcome.error, Some(ProvisionError::AmbiguousState { .. })));
        assert_eq!(outcome.run.outcome_of("release-exists"), Some(StageOutcome::Failed));
    }

    #[tokio::test]
    async fn test_cancellation_before_step_stops_run() {
        let first = Arc::new(RecordingStage::new("init"));
        let second = Arc::new(RecordingStage::new("plan"));
        let ctx = test_context(container_unit());
        let token = Arc::clone(ctx.cancel_token());
        let cancel_stage = FnStage::new("cancel", move |_| {
            token.cancel("operator interrupt");
            Ok(StageOutput::ok_empty())
        });

        let pipeline = PipelineBuilder::new("cancelled")
            .stage(first.clone())
            .stage(Arc::new(cancel_stage))
            .stage(second.clone())
            .build()
            .unwrap();

        let outcome = pipeline.run(ctx).await;

        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 0);
        assert!(outcome.run.result("plan").is_none());
        assert!(matches!(
            outcome.error,
            Some(ProvisionError::Cancelled { ref reason }) if reason == "operator interrupt"
        ));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_stage() {
        let ctx = test_context(container_unit());
        let _timer = ctx.cancel_token().cancel_after(Duration::from_millis(30));
        let slow = Arc::new(SlowStage::new("build", Duration::from_secs(10)));

        let pipeline = PipelineBuilder::new("deadline")
            .stage(slow.clone())
            .stage(Arc::new(RecordingStage::new("push")))
            .build()
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), pipeline.run(ctx))
            .await
            .unwrap();

        assert!(!slow.completed());
        assert!(matches!(outcome.error, Some(ProvisionError::Cancelled { .. })));
        assert_eq!(outcome.run.outcome_of("build"), Some(StageOutcome::Failed));
    }

    #[tokio::test]
    async fn test_deadline_inside_group_reports_cancellation() {
        let ctx = test_context(workspace_unit());
        let _timer = ctx.cancel_token().cancel_after(Duration::from_millis(30));
        let apply = Arc::new(RecordingStage::new("apply"));

        let pipeline = PipelineBuilder::new("deadline")
            .group(
                ParallelGroup::new("inspect")
                    .member(Arc::new(SlowStage::new("drift", Duration::from_secs(10))))
                    .member(Arc::new(SlowStage::new("plan", Duration::from_secs(10)))),
            )
            .stage(apply.clone())
            .build()
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), pipeline.run(ctx))
            .await
            .unwrap();

        assert!(matches!(outcome.error, Some(ProvisionError::Cancelled { .. })));
        assert_eq!(outcome.run.outcome_of("inspect"), Some(StageOutcome::Failed));
        assert_eq!(apply.call_count(), 0);
    }

    #[tokio::test]
    async fn test_skipped_stage_counts_as_success() {
        let pipeline = PipelineBuilder::new("container")
            .step(Step::Group(
                ParallelGroup::new("verify")
                    .member(Arc::new(FnStage::new("tag", |_| Ok(StageOutput::skip("no retag required")))))
                    .member(Arc::new(RecordingStage::new("scan"))),
            ))
            .build()
            .unwrap();

        let outcome = pipeline.run(test_context(container_unit())).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.run.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let pipeline = PipelineBuilder::new("events")
            .stage(Arc::new(RecordingStage::new("build")))
            .gate(gate(true, Arc::new(ScriptedPrompter::answering(true))))
            .build()
            .unwrap();

        let (ctx, sink) = collecting_context(container_unit());
        pipeline.run(ctx).await;

        assert_eq!(
            sink.event_types(),
            vec![
                "pipeline.started",
                "stage.started",
                "stage.completed",
                "confirmation.decided",
                "pipeline.completed",
            ]
        );
    }
}
