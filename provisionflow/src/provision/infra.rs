//! Terraform workspace provisioning.

use super::{opaque_debug, RunConfig};
use crate::collaborators::{
    Applier, DriftDetector, Initializer, OutputReader, Planner, TerraformCli, WorkspaceSpec,
};
use crate::context::StageContext;
use crate::core::{DeployableUnit, StageOutput};
use crate::errors::{CollaboratorError, ConfigurationError, ProvisionError};
use crate::pipeline::{ConfirmationGate, ParallelGroup, Pipeline, PipelineBuilder, Prompter};
use crate::stages::Stage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Everything an infrastructure run needs, resolved from flags once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraConfig {
    /// Terraform working directory.
    pub dir: PathBuf,
    pub vars: Vec<(String, String)>,
    pub var_files: Vec<PathBuf>,
}

impl InfraConfig {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            vars: Vec::new(),
            var_files: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        if !self.dir.is_dir() {
            return Err(ConfigurationError::new(format!(
                "working directory '{}' does not exist",
                self.dir.display()
            ))
            .with_field("dir")
            .with_fix_hint("Pass --dir pointing at a Terraform configuration.")
            .into());
        }
        if let Some(missing) = self.var_files.iter().find(|file| !self.dir.join(file).is_file()) {
            return Err(ConfigurationError::new(format!(
                "var file '{}' does not exist",
                missing.display()
            ))
            .with_field("var-file")
            .into());
        }
        Ok(())
    }

    #[must_use]
    pub fn workspace_spec(&self) -> WorkspaceSpec {
        WorkspaceSpec {
            dir: self.dir.clone(),
            vars: self.vars.clone(),
            var_files: self.var_files.clone(),
        }
    }

    /// The workspace unit, named after the directory.
    #[must_use]
    pub fn unit(&self) -> DeployableUnit {
        let dir = self.dir.display().to_string();
        let name = self
            .dir
            .canonicalize()
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| dir.clone());
        DeployableUnit::workspace(name, dir)
    }
}

/// Infrastructure collaborators.
#[derive(Clone)]
pub struct InfraToolchain {
    pub initializer: Arc<dyn Initializer>,
    pub drift: Arc<dyn DriftDetector>,
    pub planner: Arc<dyn Planner>,
    pub applier: Arc<dyn Applier>,
    pub outputs: Arc<dyn OutputReader>,
}

impl InfraToolchain {
    /// Every collaborator backed by one terraform CLI.
    #[must_use]
    pub fn terraform(terraform: TerraformCli) -> Self {
        let terraform = Arc::new(terraform);
        Self {
            initializer: terraform.clone(),
            drift: terraform.clone(),
            planner: terraform.clone(),
            applier: terraform.clone(),
            outputs: terraform,
        }
    }
}

struct InitStage {
    initializer: Arc<dyn Initializer>,
    workspace: Arc<WorkspaceSpec>,
}

struct DriftStage {
    drift: Arc<dyn DriftDetector>,
    workspace: Arc<WorkspaceSpec>,
}

struct PlanStage {
    planner: Arc<dyn Planner>,
    workspace: Arc<WorkspaceSpec>,
}

struct ApplyStage {
    applier: Arc<dyn Applier>,
    workspace: Arc<WorkspaceSpec>,
}

struct OutputStage {
    outputs: Arc<dyn OutputReader>,
    workspace: Arc<WorkspaceSpec>,
}

opaque_debug!(InitStage, DriftStage, PlanStage, ApplyStage, OutputStage);

#[async_trait]
impl Stage for InitStage {
    fn name(&self) -> &str {
        "init"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        self.initializer.init(&self.workspace, ctx.cancel_token()).await?;
        Ok(StageOutput::ok_value("dir", json!(self.workspace.dir)))
    }
}

#[async_trait]
impl Stage for DriftStage {
    fn name(&self) -> &str {
        "drift"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let report = self.drift.detect(&self.workspace, ctx.cancel_token()).await?;
        if report.drifted {
            warn!(dir = %self.workspace.dir.display(), "Infrastructure has drifted from its configuration");
        }
        Ok(StageOutput::ok_value("drifted", json!(report.drifted)))
    }
}

#[async_trait]
impl Stage for PlanStage {
    fn name(&self) -> &str {
        "plan"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let report = self.planner.plan(&self.workspace, ctx.cancel_token()).await?;
        Ok(StageOutput::ok_value("changes", json!(report.changes))
            .with_data("plan_file", json!(report.plan_file)))
    }
}

#[async_trait]
impl Stage for ApplyStage {
    fn name(&self) -> &str {
        "apply"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        self.applier.apply(&self.workspace, ctx.cancel_token()).await?;
        Ok(StageOutput::ok_empty())
    }
}

#[async_trait]
impl Stage for OutputStage {
    fn name(&self) -> &str {
        "output"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let outputs = self.outputs.read(&self.workspace, ctx.cancel_token()).await?;
        let shown: Map<String, Value> = outputs
            .into_iter()
            .map(|(name, output)| {
                let value = output.value.unwrap_or_else(|| json!("(sensitive)"));
                (name, value)
            })
            .collect();
        Ok(StageOutput::ok_value("outputs", Value::Object(shown)))
    }
}

/// `init → inspect{drift, plan} → confirm-apply → apply → outputs{output}`.
///
/// Drift is reported as data; only a failing drift check stops the run.
/// Apply and the outputs group share one confirmation.
pub fn infra_pipeline(
    config: &InfraConfig,
    tools: &InfraToolchain,
    run: &RunConfig,
    prompter: Arc<dyn Prompter>,
) -> Result<Pipeline, ProvisionError> {
    config.validate()?;
    let workspace = Arc::new(config.workspace_spec());

    PipelineBuilder::new("infra")
        .stage(Arc::new(InitStage {
            initializer: Arc::clone(&tools.initializer),
            workspace: Arc::clone(&workspace),
        }))
        .group(
            ParallelGroup::new("inspect")
                .member(Arc::new(DriftStage {
                    drift: Arc::clone(&tools.drift),
                    workspace: Arc::clone(&workspace),
                }))
                .member(Arc::new(PlanStage {
                    planner: Arc::clone(&tools.planner),
                    workspace: Arc::clone(&workspace),
                })),
        )
        .gate(ConfirmationGate::new(
            "confirm-apply",
            format!("apply the saved plan in {}", config.dir.display()),
            run.gate_options(),
            prompter,
        ))
        .gated(Arc::new(ApplyStage {
            applier: Arc::clone(&tools.applier),
            workspace: Arc::clone(&workspace),
        }) as Arc<dyn Stage>)
        .gated(ParallelGroup::new("outputs").member(Arc::new(OutputStage {
            outputs: Arc::clone(&tools.outputs),
            workspace,
        })))
        .build()
}
