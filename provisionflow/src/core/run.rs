//! The record of one pipeline invocation.

use super::{ConfirmationDecision, DeployableUnit, ResultKind, StageOutcome, StageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered list of stage results owned by a single invocation.
///
/// Results are append-only: a recorded stage is never re-run or replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique id of this invocation.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// Target of the run.
    pub unit: DeployableUnit,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Confirmation decision, once taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<ConfirmationDecision>,
    results: Vec<StageResult>,
}

impl PipelineRun {
    /// Starts a new run record.
    #[must_use]
    pub fn new(run_id: Uuid, pipeline: impl Into<String>, unit: DeployableUnit) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            unit,
            started_at: Utc::now(),
            ended_at: None,
            confirmation: None,
            results: Vec::new(),
        }
    }

    /// Appends a completed result.
    pub fn record(&mut self, result: StageResult) {
        self.results.push(result);
    }

    /// Appends several completed results in order.
    pub fn record_all(&mut self, results: impl IntoIterator<Item = StageResult>) {
        self.results.extend(results);
    }

    /// Marks the run as finished.
    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Returns all results in execution order.
    #[must_use]
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    /// Returns the result for a stage name.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Returns the outcome recorded for a stage name.
    #[must_use]
    pub fn outcome_of(&self, name: &str) -> Option<StageOutcome> {
        self.result(name).map(|r| r.outcome)
    }

    /// Returns the failed stage results, excluding group summaries.
    pub fn failures(&self) -> impl Iterator<Item = &StageResult> {
        self.results
            .iter()
            .filter(|r| r.is_failure() && r.kind != ResultKind::Group)
    }

    /// Returns the overall outcome of the run.
    #[must_use]
    pub fn outcome(&self) -> StageOutcome {
        if self.results.iter().any(StageResult::is_failure) {
            StageOutcome::Failed
        } else {
            StageOutcome::Success
        }
    }

    /// Counts results by outcome as (success, failed, skipped).
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        self.results
            .iter()
            .filter(|r| r.kind != ResultKind::Group)
            .fold((0, 0, 0), |(ok, failed, skipped), r| match r.outcome {
                StageOutcome::Success => (ok + 1, failed, skipped),
                StageOutcome::Failed => (ok, failed + 1, skipped),
                StageOutcome::Skipped => (ok, failed, skipped + 1),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> PipelineRun {
        PipelineRun::new(Uuid::new_v4(), "chart", DeployableUnit::release("web", "prod"))
    }

    #[test]
    fn test_empty_run_is_success() {
        assert_eq!(run().outcome(), StageOutcome::Success);
    }

    #[test]
    fn test_results_keep_order() {
        let mut run = run();
        run.record(StageResult::success("a", Utc::now()));
        run.record(StageResult::skipped("b", "declined"));

        let names: Vec<_> = run.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(run.outcome_of("b"), Some(StageOutcome::Skipped));
        assert_eq!(run.outcome(), StageOutcome::Success);
    }

    #[test]
    fn test_failure_makes_run_failed() {
        let mut run = run();
        run.record(StageResult::success("lint", Utc::now()));
        run.record(StageResult::failed("template", Utc::now(), "bad chart"));
        run.record(
            StageResult::failed("validate", Utc::now(), "1 member failed")
                .with_kind(ResultKind::Group),
        );

        assert_eq!(run.outcome(), StageOutcome::Failed);
        assert_eq!(run.failures().count(), 1);
        assert_eq!(run.counts(), (1, 1, 0));
    }
}
