//! Stage outcome and confirmation decision enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The terminal outcome of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Stage completed successfully.
    Success,
    /// Stage failed.
    Failed,
    /// Stage was not executed (declined gate, nothing to do).
    Skipped,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageOutcome {
    /// Returns true if the outcome allows the pipeline to continue.
    ///
    /// A skipped stage is not a failure.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Skipped)
    }

    /// Returns true if the outcome is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// The decision taken by a confirmation gate.
///
/// Decided at most once per run and reused by every gated step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationDecision {
    /// Approved by configuration, no prompt shown.
    AutoApproved,
    /// Approved interactively.
    UserApproved,
    /// Declined interactively.
    UserDeclined,
}

impl ConfirmationDecision {
    /// Returns true if gated steps may run.
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::AutoApproved | Self::UserApproved)
    }
}

impl fmt::Display for ConfirmationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoApproved => write!(f, "auto_approved"),
            Self::UserApproved => write!(f, "user_approved"),
            Self::UserDeclined => write!(f, "user_declined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(StageOutcome::Success.to_string(), "success");
        assert_eq!(StageOutcome::Failed.to_string(), "failed");
        assert_eq!(StageOutcome::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_skipped_is_not_failure() {
        assert!(StageOutcome::Skipped.is_success());
        assert!(!StageOutcome::Skipped.is_failure());
        assert!(StageOutcome::Failed.is_failure());
    }

    #[test]
    fn test_outcome_serialize() {
        let json = serde_json::to_string(&StageOutcome::Skipped).unwrap();
        assert_eq!(json, r#""skipped""#);

        let back: StageOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StageOutcome::Skipped);
    }

    #[test]
    fn test_decision_approval() {
        assert!(ConfirmationDecision::AutoApproved.is_approved());
        assert!(ConfirmationDecision::UserApproved.is_approved());
        assert!(!ConfirmationDecision::UserDeclined.is_approved());
    }
}
