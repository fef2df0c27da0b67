//! External collaborator contracts.
//!
//! The orchestrator only depends on these traits. The CLI-backed
//! implementations ([`DockerCli`], [`HelmCli`], [`TerraformCli`]) drive the
//! real tools through a [`CommandRunner`]; tests substitute mocks.
//!
//! Every call takes the run's [`CancellationToken`] so a blocking external
//! call never outlives the run's deadline.

mod docker;
mod helm;
mod requests;
mod runner;
mod terraform;

pub use docker::DockerCli;
pub use helm::HelmCli;
pub use requests::{
    BuildOptions, DriftReport, LintReport, OutputValue, Outputs, PlanReport, ReleaseSpec,
    ScanOptions, ScanReport, WorkspaceSpec,
};
pub use runner::{CommandOutput, CommandRunner, Invocation, TokioCommandRunner};
#[cfg(test)]
pub use runner::MockCommandRunner;
pub use terraform::TerraformCli;

use crate::cancellation::CancellationToken;
use crate::core::{DeployableUnit, DestinationKind};
use crate::errors::CollaboratorError;
use async_trait::async_trait;

/// Builds an image. Re-invoking after a failure must be safe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(
        &self,
        reference: &str,
        options: &BuildOptions,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError>;
}

/// Scans an image for vulnerabilities. Read-only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(
        &self,
        reference: &str,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, CollaboratorError>;
}

/// Adds a reference to an existing image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Fails with [`CollaboratorError::MissingSource`] if `source` does not exist.
    async fn tag(
        &self,
        source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError>;
}

/// Pushes an image to a registry. Registry auth is the pusher's concern.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Pusher: Send + Sync {
    async fn push(
        &self,
        reference: &str,
        destination: DestinationKind,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError>;
}

/// Removes a local image reference. Never touches remote state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Remover: Send + Sync {
    async fn remove(&self, reference: &str, cancel: &CancellationToken)
        -> Result<(), CollaboratorError>;
}

/// Answers whether a unit already exists in its scope.
///
/// Always asks the backing system; answers are never cached.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExistenceOracle: Send + Sync {
    async fn exists(
        &self,
        unit: &DeployableUnit,
        cancel: &CancellationToken,
    ) -> Result<bool, CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, release: &ReleaseSpec, cancel: &CancellationToken)
        -> Result<(), CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Upgrader: Send + Sync {
    async fn upgrade(&self, release: &ReleaseSpec, cancel: &CancellationToken)
        -> Result<(), CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Linter: Send + Sync {
    async fn lint(
        &self,
        release: &ReleaseSpec,
        cancel: &CancellationToken,
    ) -> Result<LintReport, CollaboratorError>;
}

/// Renders a chart to manifests without installing it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(
        &self,
        release: &ReleaseSpec,
        cancel: &CancellationToken,
    ) -> Result<String, CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Initializer: Send + Sync {
    async fn init(&self, workspace: &WorkspaceSpec, cancel: &CancellationToken)
        -> Result<(), CollaboratorError>;
}

/// Detects drift between recorded state and real infrastructure.
///
/// Drift is data, not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriftDetector: Send + Sync {
    async fn detect(
        &self,
        workspace: &WorkspaceSpec,
        cancel: &CancellationToken,
    ) -> Result<DriftReport, CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        workspace: &WorkspaceSpec,
        cancel: &CancellationToken,
    ) -> Result<PlanReport, CollaboratorError>;
}

/// Applies the saved plan. Irreversible.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Applier: Send + Sync {
    async fn apply(&self, workspace: &WorkspaceSpec, cancel: &CancellationToken)
        -> Result<(), CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutputReader: Send + Sync {
    async fn read(
        &self,
        workspace: &WorkspaceSpec,
        cancel: &CancellationToken,
    ) -> Result<Outputs, CollaboratorError>;
}
