//! Confirmation gate for irreversible stages.

use crate::core::{ConfirmationDecision, DeployableUnit};
use crate::errors::ProvisionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the operator is asked to confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationContext {
    pub unit: DeployableUnit,
    /// Short description of the gated action, e.g. `push web:1.0 to ecr`.
    pub action: String,
}

impl ConfirmationContext {
    #[must_use]
    pub fn new(unit: DeployableUnit, action: impl Into<String>) -> Self {
        Self {
            unit,
            action: action.into(),
        }
    }

    /// The question shown to the operator.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!("Proceed to {} for {}?", self.action, self.unit)
    }
}

/// Asks the operator a yes/no question.
#[async_trait]
pub trait Prompter: Send + Sync + fmt::Debug {
    async fn confirm(&self, message: &str) -> Result<bool, ProvisionError>;
}

/// Prompts on the controlling terminal. Defaults to "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn confirm(&self, message: &str) -> Result<bool, ProvisionError> {
        let message = message.to_string();
        tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(message)
                .default(false)
                .interact()
        })
        .await
        .map_err(|err| ProvisionError::Prompt(err.to_string()))?
        .map_err(|err| ProvisionError::Prompt(err.to_string()))
    }
}

/// Gate configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateOptions {
    /// Approve without asking.
    pub auto_approve: bool,
}

/// A yes/no decision point in front of irreversible steps.
///
/// The pipeline asks the gate at most once per run; every gated step after
/// it reuses the same decision.
#[derive(Clone)]
pub struct ConfirmationGate {
    name: String,
    action: String,
    options: GateOptions,
    prompter: Arc<dyn Prompter>,
}

impl ConfirmationGate {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        action: impl Into<String>,
        options: GateOptions,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            options,
            prompter,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[must_use]
    pub const fn options(&self) -> GateOptions {
        self.options
    }

    /// Decides whether the gated steps may run.
    ///
    /// With `auto_approve` the prompter is never consulted. A prompt that
    /// cannot be shown (no terminal, closed stdin) is an error: nobody
    /// answered, so nothing is decided.
    pub async fn approve(
        &self,
        ctx: &ConfirmationContext,
    ) -> Result<ConfirmationDecision, ProvisionError> {
        if self.options.auto_approve {
            debug!(gate = %self.name, "Auto-approved");
            return Ok(ConfirmationDecision::AutoApproved);
        }
        match self.prompter.confirm(&ctx.prompt()).await {
            Ok(true) => Ok(ConfirmationDecision::UserApproved),
            Ok(false) => Ok(ConfirmationDecision::UserDeclined),
            Err(err) => {
                warn!(gate = %self.name, error = %err, "Confirmation prompt unavailable");
                Err(match err {
                    ProvisionError::Prompt(message) => ProvisionError::Prompt(message),
                    other => ProvisionError::Prompt(other.to_string()),
                })
            }
        }
    }
}

impl fmt::Debug for ConfirmationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationGate")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
