//! Infrastructure collaborators backed by the `terraform` CLI.
//!
//! Plan writes a saved plan file in the working directory and apply consumes
//! exactly that file, so the applied change is the one that was planned.

use super::requests::{DriftReport, OutputValue, Outputs, PlanReport, WorkspaceSpec};
use super::runner::{CommandOutput, CommandRunner, Invocation};
use super::{Applier, DriftDetector, Initializer, OutputReader, Planner};
use crate::cancellation::CancellationToken;
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

const PROGRAM: &str = "terraform";

/// Saved plan file name, relative to the working directory.
pub const PLAN_FILE: &str = "provisionflow.tfplan";

/// `-detailed-exitcode`: the plan succeeded and contains changes.
const EXIT_CHANGES_PRESENT: i32 = 2;

/// Drives `terraform init`, `plan`, `apply` and `output`.
#[derive(Clone)]
pub struct TerraformCli {
    runner: Arc<dyn CommandRunner>,
}

impl TerraformCli {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn command(workspace: &WorkspaceSpec, subcommand: &str) -> Invocation {
        Invocation::new(PROGRAM)
            .arg(subcommand)
            .arg("-input=false")
            .current_dir(&workspace.dir)
    }

    fn with_vars(mut inv: Invocation, workspace: &WorkspaceSpec) -> Invocation {
        for file in &workspace.var_files {
            inv = inv.arg(format!("-var-file={}", file.display()));
        }
        for (key, value) in &workspace.vars {
            inv = inv.arg("-var").arg(format!("{key}={value}"));
        }
        inv
    }

    /// Runs a `-detailed-exitcode` plan; returns true if changes are present.
    async fn detailed_plan(
        &self,
        invocation: Invocation,
        cancel: &CancellationToken,
    ) -> Result<bool, CollaboratorError> {
        let output: CommandOutput = self.runner.run(&invocation, cancel).await?;
        match output.code {
            Some(0) => Ok(false),
            Some(EXIT_CHANGES_PRESENT) => Ok(true),
            _ => Err(output.into_error(PROGRAM)),
        }
    }
}

impl fmt::Debug for TerraformCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerraformCli").finish_non_exhaustive()
    }
}

#[async_trait]
impl Initializer for TerraformCli {
    async fn init(
        &self,
        workspace: &WorkspaceSpec,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError> {
        self.runner
            .run(&Self::command(workspace, "init"), cancel)
            .await?
            .check(PROGRAM)
            .map(drop)
    }
}

#[async_trait]
impl DriftDetector for TerraformCli {
    async fn detect(
        &self,
        workspace: &WorkspaceSpec,
        cancel: &CancellationToken,
    ) -> Result<DriftReport, CollaboratorError> {
        // Runs alongside `plan`, which holds the state lock.
        let inv = Self::command(workspace, "plan")
            .args(["-detailed-exitcode", "-refresh=true", "-lock=false"]);
        let drifted = self.detailed_plan(Self::with_vars(inv, workspace), cancel).await?;
        Ok(DriftReport { drifted })
    }
}

#[async_trait]
impl Planner for TerraformCli {
    async fn plan(
        &self,
        workspace: &WorkspaceSpec,
        cancel: &CancellationToken,
    ) -> Result<PlanReport, CollaboratorError> {
        let inv = Self::command(workspace, "plan")
            .arg("-detailed-exitcode")
            .arg(format!("-out={PLAN_FILE}"));
        let changes = self.detailed_plan(Self::with_vars(inv, workspace), cancel).await?;
        Ok(PlanReport {
            changes,
            plan_file: Some(PathBuf::from(PLAN_FILE)),
        })
    }
}

#[async_trait]
impl Applier for TerraformCli {
    async fn apply(
        &self,
        workspace: &WorkspaceSpec,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError> {
        let inv = Self::command(workspace, "apply")
            .arg("-auto-approve")
            .arg(PLAN_FILE);
        self.runner.run(&inv, cancel).await?.check(PROGRAM).map(drop)
    }
}

#[derive(Deserialize)]
struct RawOutput {
    #[serde(default)]
    sensitive: bool,
    value: serde_json::Value,
}

#[async_trait]
impl OutputReader for TerraformCli {
    async fn read(
        &self,
        workspace: &WorkspaceSpec,
        cancel: &CancellationToken,
    ) -> Result<Outputs, CollaboratorError> {
        let inv = Invocation::new(PROGRAM)
            .args(["output", "-json"])
            .current_dir(&workspace.dir);
        let stdout = self.runner.run(&inv, cancel).await?.check(PROGRAM)?.stdout;
        parse_outputs(&stdout)
    }
}

fn parse_outputs(stdout: &str) -> Result<Outputs, CollaboratorError> {
    let raw: BTreeMap<String, RawOutput> =
        serde_json::from_str(stdout).map_err(|err| CollaboratorError::Output {
            program: PROGRAM.to_string(),
            message: format!("invalid output JSON: {err}"),
        })?;
    Ok(raw
        .into_iter()
        .map(|(name, out)| {
            let value = (!out.sensitive).then_some(out.value);
            (
                name,
                OutputValue {
                    sensitive: out.sensitive,
                    value,
                },
            )
        })
        .collect())
}
