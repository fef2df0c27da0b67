//! The sequential pipeline spine.
//!
//! Steps run strictly in declaration order. A failing step stops the run
//! immediately and later steps are neither started nor recorded. Effects of
//! steps that already succeeded stay in place; nothing is rolled back.

use super::execute::{run_stage, StageRun};
use super::gate::{ConfirmationContext, ConfirmationGate};
use super::group::ParallelGroup;
use super::step::Step;
use crate::context::{PipelineContext, StageContext};
use crate::core::{PipelineRun, ResultKind, StageOutcome, StageResult};
use crate::errors::{ProvisionError, EXIT_SUCCESS};
use crate::stages::Stage;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Skip reason for gated steps after a declined confirmation.
pub const DECLINED_REASON: &str = "confirmation declined";

/// A validated, ready-to-run pipeline. Built by [`super::PipelineBuilder`].
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    steps: Vec<Step>,
}

impl Pipeline {
    pub(crate) fn new(name: String, steps: Vec<Step>) -> Self {
        Self { name, steps }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Runs every step in order against one invocation's context.
    #[instrument(skip_all, fields(pipeline = %self.name, run_id = %ctx.run_id()))]
    pub async fn run(&self, ctx: Arc<PipelineContext>) -> RunOutcome {
        let mut run = PipelineRun::new(ctx.run_id(), &self.name, ctx.unit().clone());

        info!(unit = %ctx.unit(), steps = self.steps.len(), "Pipeline started");
        ctx.try_emit_event(
            "pipeline.started",
            Some(json!({
                "pipeline": self.name,
                "unit": ctx.unit().to_string(),
                "steps": self.steps.len(),
            })),
        );

        let mut error = None;
        for step in &self.steps {
            if ctx.is_cancelled() {
                error = Some(ProvisionError::Cancelled {
                    reason: ctx.cancel_token().reason_or_default(),
                });
                break;
            }
            if let Err(err) = self.execute_step(step, &ctx, &mut run).await {
                error = Some(err);
                break;
            }
        }

        run.confirmation = ctx.confirmation();
        run.finish();

        let (ok, failed, skipped) = run.counts();
        match &error {
            None => info!(ok, skipped, "Pipeline completed"),
            Some(err) => warn!(ok, failed, skipped, error = %err, "Pipeline failed"),
        }
        let outcome = if error.is_none() {
            StageOutcome::Success
        } else {
            StageOutcome::Failed
        };
        ctx.try_emit_event(
            "pipeline.completed",
            Some(json!({
                "outcome": outcome,
                "error": error.as_ref().map(ToString::to_string),
            })),
        );

        RunOutcome { run, error }
    }

    async fn execute_step(
        &self,
        step: &Step,
        ctx: &Arc<PipelineContext>,
        run: &mut PipelineRun,
    ) -> Result<(), ProvisionError> {
        let Step::Gated(inner) = step else {
            return self.execute_ungated(step, ctx, run).await;
        };
        match ctx.confirmation() {
            Some(decision) if decision.is_approved() => self.execute_ungated(inner, ctx, run).await,
            Some(_) => {
                skip_step(inner, DECLINED_REASON, ctx, run);
                Ok(())
            }
            // Ruled out by the builder.
            None => Err(ProvisionError::configuration(format!(
                "gated step '{}' reached before any confirmation gate",
                inner.name()
            ))),
        }
    }

    async fn execute_ungated(
        &self,
        step: &Step,
        ctx: &Arc<PipelineContext>,
        run: &mut PipelineRun,
    ) -> Result<(), ProvisionError> {
        match step {
            Step::Stage(stage) => run_single(stage.as_ref(), ctx, run).await,
            Step::Group(group) => run_group(group, ctx, run).await,
            Step::Gate(gate) => decide(gate, ctx, run).await,
            Step::Branch(branch) => {
                let started_at = Utc::now();
                match branch.resolve(ctx.unit(), ctx.cancel_token()).await {
                    Ok((fact, stage)) => {
                        run.record(
                            StageResult::success(branch.name(), started_at)
                                .with_kind(ResultKind::Check)
                                .with_data("exists", json!(fact.exists))
                                .with_data("selected", json!(stage.name())),
                        );
                        ctx.try_emit_event(
                            "existence.checked",
                            Some(json!({
                                "branch": branch.name(),
                                "exists": fact.exists,
                                "selected": stage.name(),
                            })),
                        );
                        run_single(stage.as_ref(), ctx, run).await
                    }
                    Err(err) => {
                        run.record(
                            StageResult::failed(branch.name(), started_at, err.to_string())
                                .with_kind(ResultKind::Check),
                        );
                        Err(err)
                    }
                }
            }
            Step::Gated(inner) => Err(ProvisionError::configuration(format!(
                "step '{}' is gated twice",
                inner.name()
            ))),
        }
    }
}

async fn run_single(
    stage: &dyn Stage,
    ctx: &Arc<PipelineContext>,
    run: &mut PipelineRun,
) -> Result<(), ProvisionError> {
    let stage_ctx = StageContext::new(Arc::clone(ctx), stage.name());
    let StageRun { result, error } = run_stage(stage, &stage_ctx).await;
    run.record(result);
    match error {
        Some(err) => Err(ProvisionError::from_stage(stage.name(), err)),
        None => Ok(()),
    }
}

async fn run_group(
    group: &ParallelGroup,
    ctx: &Arc<PipelineContext>,
    run: &mut PipelineRun,
) -> Result<(), ProvisionError> {
    let outcome = group.run(ctx).await;
    let error = outcome.error();
    let interrupted = outcome.was_interrupted();
    run.record_all(outcome.results);

    // Members failing because the run was cancelled report the cancellation.
    if interrupted || (error.is_some() && ctx.is_cancelled()) {
        return Err(ProvisionError::Cancelled {
            reason: ctx.cancel_token().reason_or_default(),
        });
    }
    match error {
        Some(aggregated) => Err(aggregated.into()),
        None => Ok(()),
    }
}

/// Records the run's confirmation decision, asking the gate only if no
/// earlier gate already decided.
async fn decide(
    gate: &ConfirmationGate,
    ctx: &Arc<PipelineContext>,
    run: &mut PipelineRun,
) -> Result<(), ProvisionError> {
    let started_at = Utc::now();
    let decision = match ctx.confirmation() {
        Some(decided) => decided,
        None => {
            let request = ConfirmationContext::new(ctx.unit().clone(), gate.action());
            let approval = tokio::select! {
                approval = gate.approve(&request) => approval,
                () = ctx.cancel_token().cancelled() => {
                    return Err(ProvisionError::Cancelled {
                        reason: ctx.cancel_token().reason_or_default(),
                    });
                }
            };
            match approval {
                Ok(decision) => ctx.decide_confirmation(decision),
                Err(err) => {
                    // No answer: the run fails and no decision is stored.
                    run.record(
                        StageResult::failed(gate.name(), started_at, err.to_string())
                            .with_kind(ResultKind::Gate),
                    );
                    return Err(err);
                }
            }
        }
    };

    info!(gate = %gate.name(), decision = %decision, "Confirmation decided");
    ctx.try_emit_event(
        "confirmation.decided",
        Some(json!({ "gate": gate.name(), "decision": decision })),
    );
    run.record(
        StageResult::success(gate.name(), started_at)
            .with_kind(ResultKind::Gate)
            .with_data("decision", json!(decision)),
    );
    Ok(())
}

/// Records a step that will not run, including every member of a group.
fn skip_step(step: &Step, reason: &str, ctx: &PipelineContext, run: &mut PipelineRun) {
    match step {
        Step::Group(group) => {
            for member in group.members() {
                run.record(StageResult::skipped(member.name(), reason).in_group(group.name()));
            }
            run.record(StageResult::skipped(group.name(), reason).with_kind(ResultKind::Group));
        }
        Step::Branch(branch) => {
            run.record(StageResult::skipped(branch.name(), reason).with_kind(ResultKind::Check));
        }
        Step::Gate(gate) => {
            run.record(StageResult::skipped(gate.name(), reason).with_kind(ResultKind::Gate));
        }
        Step::Stage(stage) => run.record(StageResult::skipped(stage.name(), reason)),
        Step::Gated(inner) => {
            skip_step(inner, reason, ctx, run);
            return;
        }
    }
    info!(step = %step.name(), reason, "Step skipped");
    ctx.try_emit_event(
        "stage.skipped",
        Some(json!({ "stage": step.name(), "reason": reason })),
    );
}

/// The result of one pipeline run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Every recorded result, in recording order.
    pub run: PipelineRun,
    /// The error that stopped the run, if any.
    pub error: Option<ProvisionError>,
}

impl RunOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    #[must_use]
    pub const fn outcome(&self) -> StageOutcome {
        if self.is_success() {
            StageOutcome::Success
        } else {
            StageOutcome::Failed
        }
    }

    /// Process exit code for this run.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match &self.error {
            None => EXIT_SUCCESS,
            Some(err) => err.exit_code(),
        }
    }

    /// Returns the run record, or the error that stopped it.
    pub fn into_result(self) -> Result<PipelineRun, ProvisionError> {
        match self.error {
            None => Ok(self.run),
            Some(err) => Err(err),
        }
    }
}
