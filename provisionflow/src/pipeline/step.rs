//! Steps of a sequential pipeline.

use super::branch::ExistenceBranch;
use super::gate::ConfirmationGate;
use super::group::ParallelGroup;
use crate::stages::Stage;
use std::sync::Arc;

/// One entry of the sequential spine.
#[derive(Debug)]
pub enum Step {
    /// A single stage.
    Stage(Arc<dyn Stage>),
    /// Sibling stages run concurrently and joined.
    Group(ParallelGroup),
    /// Records the run's confirmation decision.
    Gate(ConfirmationGate),
    /// Runs one of two stages depending on whether the unit exists.
    Branch(ExistenceBranch),
    /// Runs the inner step only if the run's confirmation was approved;
    /// otherwise records it as skipped.
    Gated(Box<Step>),
}

impl Step {
    /// Wraps a step so it only runs after an approved confirmation.
    #[must_use]
    pub fn gated(step: Self) -> Self {
        Self::Gated(Box::new(step))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Stage(stage) => stage.name(),
            Self::Group(group) => group.name(),
            Self::Gate(gate) => gate.name(),
            Self::Branch(branch) => branch.name(),
            Self::Gated(inner) => inner.name(),
        }
    }

    /// Every result name this step can record.
    #[must_use]
    pub fn result_names(&self) -> Vec<&str> {
        match self {
            Self::Group(group) => std::iter::once(group.name())
                .chain(group.members().iter().map(|m| m.name()))
                .collect(),
            Self::Gated(inner) => inner.result_names(),
            other => vec![other.name()],
        }
    }

    #[must_use]
    pub const fn is_gated(&self) -> bool {
        matches!(self, Self::Gated(_))
    }
}

impl From<Arc<dyn Stage>> for Step {
    fn from(stage: Arc<dyn Stage>) -> Self {
        Self::Stage(stage)
    }
}

impl From<ParallelGroup> for Step {
    fn from(group: ParallelGroup) -> Self {
        Self::Group(group)
    }
}

impl From<ConfirmationGate> for Step {
    fn from(gate: ConfirmationGate) -> Self {
        Self::Gate(gate)
    }
}

impl From<ExistenceBranch> for Step {
    fn from(branch: ExistenceBranch) -> Self {
        Self::Branch(branch)
    }
}
