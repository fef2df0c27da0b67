//! Recorded stage results.

use super::{StageOutcome, StageOutput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What produced a result entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// A single stage.
    Stage,
    /// The synthetic summary of a parallel group.
    Group,
    /// A confirmation gate.
    Gate,
    /// An existence check preceding a branch.
    Check,
}

/// Immutable record of one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name.
    pub name: String,
    /// What produced this entry.
    pub kind: ResultKind,
    /// Terminal outcome.
    pub outcome: StageOutcome,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Skip reason if skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Enclosing parallel group, for group members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
    /// Result data.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
}

impl StageResult {
    /// Creates a result from a stage output.
    #[must_use]
    pub fn from_output(
        name: impl Into<String>,
        started_at: DateTime<Utc>,
        output: StageOutput,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ResultKind::Stage,
            outcome: output.outcome,
            error: None,
            skip_reason: output.skip_reason,
            group: None,
            started_at,
            ended_at: Utc::now(),
            data: output.data,
        }
    }

    /// Creates a successful result with no data.
    #[must_use]
    pub fn success(name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self::from_output(name, started_at, StageOutput::ok_empty())
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(
        name: impl Into<String>,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ResultKind::Stage,
            outcome: StageOutcome::Failed,
            error: Some(error.into()),
            skip_reason: None,
            group: None,
            started_at,
            ended_at: Utc::now(),
            data: HashMap::new(),
        }
    }

    /// Creates a result for a stage that never ran.
    #[must_use]
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            kind: ResultKind::Stage,
            outcome: StageOutcome::Skipped,
            error: None,
            skip_reason: Some(reason.into()),
            group: None,
            started_at: now,
            ended_at: now,
            data: HashMap::new(),
        }
    }

    /// Sets the result kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ResultKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks the result as a member of a parallel group.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Adds a single data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == StageOutcome::Success
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome == StageOutcome::Failed
    }

    /// Returns true if the stage was skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.outcome == StageOutcome::Skipped
    }
}
