//! Error types for provisionflow.
//!
//! The taxonomy separates errors that stop a run before any stage executes
//! (configuration), errors attributed to a single stage (collaborator),
//! errors from an unanswerable existence check (ambiguous state), and the
//! aggregated failure of a parallel group. A declined confirmation is not an
//! error at all; it is recorded as a skipped stage.

use thiserror::Error;

/// Exit code for a successful run.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a run with at least one failed stage.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for a run rejected before any stage executed.
pub const EXIT_CONFIGURATION: i32 = 2;

/// The main error type for provisionflow operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Missing or invalid configuration; no stage ran.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A collaborator call failed inside a stage.
    #[error("stage '{stage}' failed: {source}")]
    Collaborator {
        /// The stage the failure is attributed to.
        stage: String,
        /// The underlying collaborator error.
        #[source]
        source: CollaboratorError,
    },

    /// The existence check behind a branch could not be answered.
    #[error("cannot determine whether {unit} exists: {source}")]
    AmbiguousState {
        /// The unit that was checked.
        unit: String,
        /// The underlying collaborator error.
        #[source]
        source: CollaboratorError,
    },

    /// One or more members of a parallel group failed.
    #[error("{0}")]
    Aggregated(#[from] AggregatedError),

    /// The run was cancelled or exceeded its deadline.
    #[error("pipeline cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },

    /// The interactive confirmation prompt could not be shown.
    #[error("confirmation prompt failed: {0}")]
    Prompt(String),
}

impl ProvisionError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError::new(message))
    }

    /// Attributes a collaborator error to a stage.
    ///
    /// Cancellation observed by a collaborator becomes a run cancellation.
    #[must_use]
    pub fn from_stage(stage: impl Into<String>, source: CollaboratorError) -> Self {
        match source {
            CollaboratorError::Cancelled(reason) => Self::Cancelled { reason },
            source => Self::Collaborator {
                stage: stage.into(),
                source,
            },
        }
    }

    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => EXIT_CONFIGURATION,
            _ => EXIT_FAILURE,
        }
    }

    /// Returns the names of the stages this error is attributed to.
    #[must_use]
    pub fn stages(&self) -> Vec<&str> {
        match self {
            Self::Collaborator { stage, .. } => vec![stage.as_str()],
            Self::Aggregated(agg) => agg.failures.iter().map(|f| f.stage.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Error raised when an invocation is missing required identity or flags.
#[derive(Debug, Clone, Error)]
#[error("configuration error: {message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The offending field, flag or stage, if known.
    pub field: Option<String>,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
            fix_hint: None,
        }
    }

    /// Sets the offending field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// One failed member of a parallel group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage}: {message}")]
pub struct StageFailure {
    /// The member stage name.
    pub stage: String,
    /// The member's error message.
    pub message: String,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Every failure of a parallel group, in member order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "parallel group '{group}' failed ({} of {members} members): {}",
    .failures.len(),
    .failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
)]
pub struct AggregatedError {
    /// The group name.
    pub group: String,
    /// Number of members in the group.
    pub members: usize,
    /// One entry per failed member.
    pub failures: Vec<StageFailure>,
}

/// Errors raised by external collaborators (image builder, chart installer,
/// infrastructure planner and so on).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The tool binary could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The tool exited unsuccessfully.
    #[error("{program} exited with {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
    Exit {
        /// The program that failed.
        program: String,
        /// The exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The tool produced output that could not be interpreted.
    #[error("unexpected output from {program}: {message}")]
    Output {
        /// The program whose output was rejected.
        program: String,
        /// What was wrong with it.
        message: String,
    },

    /// A required source artifact does not exist.
    #[error("source does not exist: {0}")]
    MissingSource(String),

    /// The call was cancelled before it completed.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The stage task panicked.
    #[error("stage panicked: {0}")]
    Panicked(String),

    /// Any other collaborator failure.
    #[error("{0}")]
    Other(String),
}

impl CollaboratorError {
    /// Creates a generic collaborator error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Returns true if the error reports a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
