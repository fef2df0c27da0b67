//! Declarative construction of a pipeline.

use super::branch::ExistenceBranch;
use super::gate::ConfirmationGate;
use super::group::ParallelGroup;
use super::sequential::Pipeline;
use super::step::Step;
use crate::errors::{ConfigurationError, ProvisionError};
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for a [`Pipeline`].
///
/// `build` rejects shapes that could never run correctly: no steps,
/// duplicate names, a gated step with no gate before it, and gated steps
/// that wrap a gate or another gated step.
#[derive(Debug)]
pub struct PipelineBuilder {
    name: String,
    steps: Vec<Step>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Appends any step.
    #[must_use]
    pub fn step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Appends a single stage.
    #[must_use]
    pub fn stage(self, stage: Arc<dyn Stage>) -> Self {
        self.step(Step::Stage(stage))
    }

    /// Appends a parallel group.
    #[must_use]
    pub fn group(self, group: ParallelGroup) -> Self {
        self.step(Step::Group(group))
    }

    /// Appends a confirmation gate.
    #[must_use]
    pub fn gate(self, gate: ConfirmationGate) -> Self {
        self.step(Step::Gate(gate))
    }

    /// Appends an existence branch.
    #[must_use]
    pub fn branch(self, branch: ExistenceBranch) -> Self {
        self.step(Step::Branch(branch))
    }

    /// Appends a step that only runs after an approved confirmation.
    #[must_use]
    pub fn gated(self, step: impl Into<Step>) -> Self {
        self.step(Step::gated(step.into()))
    }

    /// Appends a gated step when `condition` holds.
    #[must_use]
    pub fn gated_if(self, condition: bool, step: impl FnOnce() -> Step) -> Self {
        if condition {
            self.gated(step())
        } else {
            self
        }
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Validates and builds the pipeline.
    pub fn build(self) -> Result<Pipeline, ProvisionError> {
        if self.steps.is_empty() {
            return Err(ConfigurationError::new(format!("pipeline '{}' has no steps", self.name))
                .with_fix_hint("Add at least one stage before building.")
                .into());
        }

        let mut seen = HashSet::new();
        let mut gate_seen = false;
        for step in &self.steps {
            for name in step.result_names() {
                if !seen.insert(name) {
                    return Err(ConfigurationError::new(format!(
                        "duplicate step name '{name}' in pipeline '{}'",
                        self.name
                    ))
                    .with_field(name)
                    .with_fix_hint("Give every stage, group and gate a unique name.")
                    .into());
                }
            }

            match step {
                Step::Gate(_) => gate_seen = true,
                Step::Gated(inner) => {
                    if matches!(inner.as_ref(), Step::Gate(_) | Step::Gated(_)) {
                        return Err(ConfigurationError::new(format!(
                            "step '{}' cannot be gated: only stages, groups and branches can",
                            inner.name()
                        ))
                        .with_field(inner.name())
                        .into());
                    }
                    if !gate_seen {
                        return Err(ConfigurationError::new(format!(
                            "gated step '{}' has no confirmation gate before it",
                            inner.name()
                        ))
                        .with_field(inner.name())
                        .with_fix_hint("Declare a confirmation gate earlier in the pipeline.")
                        .into());
                    }
                }
                _ => {}
            }
        }

        Ok(Pipeline::new(self.name, self.steps))
    }
}
