//! Stage output type with factory methods.

use super::StageOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The value a stage hands back when it does not fail.
///
/// Failures are reported through the stage's error type instead, so an
/// output is always either a success or a skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Success or skipped.
    pub outcome: StageOutcome,

    /// Data produced by the stage, recorded in its result.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    /// Skip reason (for skipped executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl Default for StageOutput {
    fn default() -> Self {
        Self::ok_empty()
    }
}

impl StageOutput {
    /// Creates a successful output with data.
    #[must_use]
    pub fn ok(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            outcome: StageOutcome::Success,
            data,
            skip_reason: None,
        }
    }

    /// Creates a successful output with no data.
    #[must_use]
    pub fn ok_empty() -> Self {
        Self::ok(HashMap::new())
    }

    /// Creates a successful output with a single value.
    #[must_use]
    pub fn ok_value(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self::ok_empty().with_data(key, value)
    }

    /// Creates a skip output with a reason.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            outcome: StageOutcome::Skipped,
            data: HashMap::new(),
            skip_reason: Some(reason.into()),
        }
    }

    /// Adds a single data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns true if the stage did its work.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == StageOutcome::Success
    }

    /// Returns true if the stage decided there was nothing to do.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.outcome == StageOutcome::Skipped
    }
}
