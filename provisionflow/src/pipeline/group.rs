//! Fork/join execution of sibling stages with aggregated failure reporting.
//!
//! Members are started together and joined together. A failing member never
//! aborts its siblings; every failure is collected and reported after the
//! join, each tagged with the member's stage name.

use super::execute::{run_stage, StageRun};
use crate::context::{PipelineContext, StageContext};
use crate::core::{ResultKind, StageOutcome, StageResult};
use crate::errors::{AggregatedError, CollaboratorError, StageFailure};
use crate::stages::Stage;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Skip reason recorded for members never started because of cancellation.
pub const NOT_STARTED_REASON: &str = "run cancelled before member started";

/// A set of sibling stages run concurrently.
///
/// Members must not depend on each other's output.
#[derive(Debug, Clone)]
pub struct ParallelGroup {
    name: String,
    members: Vec<Arc<dyn Stage>>,
}

impl ParallelGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Creates a group from a list of members.
    #[must_use]
    pub fn with_members(name: impl Into<String>, members: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// Adds a member.
    #[must_use]
    pub fn member(mut self, stage: Arc<dyn Stage>) -> Self {
        self.members.push(stage);
        self
    }

    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the members.
    #[must_use]
    pub fn members(&self) -> &[Arc<dyn Stage>] {
        &self.members
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Runs every member concurrently and waits for all of them.
    ///
    /// Each member runs in its own task and hands its result back through
    /// its join handle. If the run is cancelled while members are being
    /// started, the remaining members are not started; members already
    /// running are left to finish or to observe the cancellation themselves.
    pub async fn run(&self, ctx: &Arc<PipelineContext>) -> GroupOutcome {
        let started_at = Utc::now();
        let mut aggregator = ErrorAggregator::new(&self.name, self.members.len());

        debug!(group = %self.name, members = self.members.len(), "Forking parallel group");

        let mut pending: Vec<(String, Option<JoinHandle<StageRun>>)> =
            Vec::with_capacity(self.members.len());
        for member in &self.members {
            let name = member.name().to_string();
            if ctx.is_cancelled() {
                pending.push((name, None));
                continue;
            }
            let stage = Arc::clone(member);
            let stage_ctx = StageContext::new(Arc::clone(ctx), &name);
            let handle = tokio::spawn(async move { run_stage(stage.as_ref(), &stage_ctx).await });
            pending.push((name, Some(handle)));
        }

        let (names, handles): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
        let joined = join_all(handles.into_iter().map(|handle| async move {
            match handle {
                Some(handle) => Some(handle.await),
                None => None,
            }
        }))
        .await;

        for (name, joined) in names.into_iter().zip(joined) {
            match joined {
                None => aggregator.refuse(name),
                Some(Ok(run)) => aggregator.record(run.result),
                Some(Err(join_error)) => {
                    warn!(group = %self.name, stage = %name, error = %join_error, "Group member aborted");
                    let error = CollaboratorError::Panicked(join_error.to_string());
                    aggregator.record(StageResult::failed(name, started_at, error.to_string()));
                }
            }
        }

        let outcome = aggregator.finish(started_at);
        ctx.try_emit_event(
            "group.joined",
            Some(json!({
                "group": self.name,
                "outcome": outcome.outcome,
                "failed": outcome.errors.iter().map(|f| f.stage.clone()).collect::<Vec<_>>(),
            })),
        );
        outcome
    }
}

/// Merges member results of one group into a single terminal decision.
#[derive(Debug)]
pub struct ErrorAggregator {
    group: String,
    members: usize,
    results: Vec<StageResult>,
    failures: Vec<StageFailure>,
    not_started: usize,
}

impl ErrorAggregator {
    /// Creates an aggregator for a group.
    #[must_use]
    pub fn new(group: impl Into<String>, members: usize) -> Self {
        Self {
            group: group.into(),
            members,
            results: Vec::with_capacity(members + 1),
            failures: Vec::new(),
            not_started: 0,
        }
    }

    /// Records a finished member.
    pub fn record(&mut self, result: StageResult) {
        if result.is_failure() {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            self.failures.push(StageFailure::new(&result.name, message));
        }
        self.results.push(result.in_group(&self.group));
    }

    /// Records a member that was never started.
    pub fn refuse(&mut self, stage: impl Into<String>) {
        self.not_started += 1;
        self.results
            .push(StageResult::skipped(stage, NOT_STARTED_REASON).in_group(&self.group));
    }

    /// Produces the group outcome, appending the synthetic group result.
    #[must_use]
    pub fn finish(mut self, started_at: DateTime<Utc>) -> GroupOutcome {
        let error = if self.failures.is_empty() {
            None
        } else {
            Some(AggregatedError {
                group: self.group.clone(),
                members: self.members,
                failures: self.failures.clone(),
            })
        };

        let summary = match &error {
            None => StageResult::success(&self.group, started_at),
            Some(err) => StageResult::failed(&self.group, started_at, err.to_string()),
        }
        .with_kind(ResultKind::Group)
        .with_data("members", json!(self.members))
        .with_data("failed", json!(self.failures.len()))
        .with_data("not_started", json!(self.not_started));

        let outcome = summary.outcome;
        self.results.push(summary);

        GroupOutcome {
            outcome,
            results: self.results,
            errors: self.failures,
            not_started: self.not_started,
            members: self.members,
            group: self.group,
        }
    }
}

/// The joined result of a parallel group.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    /// `Success` iff no member failed.
    pub outcome: StageOutcome,
    /// One result per member in declaration order, then the group summary.
    pub results: Vec<StageResult>,
    /// One entry per failed member.
    pub errors: Vec<StageFailure>,
    /// Members refused because the run was cancelled.
    pub not_started: usize,
    members: usize,
    group: String,
}

impl GroupOutcome {
    /// Returns true if every member succeeded or skipped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == StageOutcome::Success
    }

    /// Returns true if cancellation kept some members from starting.
    #[must_use]
    pub const fn was_interrupted(&self) -> bool {
        self.not_started > 0
    }

    /// Returns the aggregated error naming every failed member.
    #[must_use]
    pub fn error(&self) -> Option<AggregatedError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(AggregatedError {
                group: self.group.clone(),
                members: self.members,
                failures: self.errors.clone(),
            })
        }
    }

    /// Returns the synthetic group summary result.
    #[must_use]
    pub fn summary(&self) -> Option<&StageResult> {
        self.results.last().filter(|r| r.kind == ResultKind::Group)
    }
}
