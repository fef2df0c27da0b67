//! Command-line surface.
//!
//! Three tool families, each with a `provision` verb:
//!
//! ```text
//! provisionflow sdkr provision --image web --tag 1.0 --destination ecr ...
//! provisionflow selm provision web ./chart --namespace prod
//! provisionflow stf provision --dir ./infra
//! ```

mod args;
mod logging;
pub mod report;

pub use args::{ChartArgs, ContainerArgs, DestinationArg, InfraArgs};

use crate::collaborators::{CommandRunner, DockerCli, HelmCli, TerraformCli, TokioCommandRunner};
use crate::core::DeployableUnit;
use crate::errors::{ProvisionError, EXIT_CONFIGURATION};
use crate::events::LoggingEventSink;
use crate::pipeline::{Pipeline, Prompter, TerminalPrompter};
use crate::provision::{
    self, chart_pipeline, container_pipeline, infra_pipeline, ChartToolchain, ContainerToolchain,
    InfraToolchain, OutputFormat, RunConfig,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{debug, info};

/// Staged provisioning for container images, Helm charts and Terraform workspaces.
#[derive(Debug, Parser)]
#[command(name = "provisionflow", version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Run report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    pub output: OutputFormat,

    /// Abort the run after this many seconds
    #[arg(long, env = "PROVISIONFLOW_TIMEOUT", value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Approve every confirmation without prompting
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Container image workflows
    Sdkr {
        #[command(subcommand)]
        command: ContainerCommand,
    },
    /// Helm chart workflows
    Selm {
        #[command(subcommand)]
        command: ChartCommand,
    },
    /// Terraform workflows
    Stf {
        #[command(subcommand)]
        command: InfraCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ContainerCommand {
    /// Build, scan, tag and push an image
    Provision(ContainerArgs),
}

#[derive(Debug, Subcommand)]
pub enum ChartCommand {
    /// Install or upgrade a release, then lint and render the chart
    Provision(ChartArgs),
}

#[derive(Debug, Subcommand)]
pub enum InfraCommand {
    /// Init, detect drift, plan, apply and print outputs
    Provision(InfraArgs),
}

impl Cli {
    #[must_use]
    pub const fn run_config(&self) -> RunConfig {
        RunConfig {
            auto_approve: self.yes,
            timeout_secs: self.timeout,
            output: self.output,
        }
    }

    /// Runs the selected command and returns the process exit code.
    ///
    /// Configuration problems are reported without running any stage.
    pub async fn run(self) -> anyhow::Result<i32> {
        logging::init(self.verbose, self.log_json)?;

        let run = self.run_config();
        let prepared = run.validate().and_then(|()| prepare(self.command, &run));
        let (pipeline, unit) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                report::print_rejection(&err);
                return Ok(EXIT_CONFIGURATION);
            }
        };

        info!(pipeline = %pipeline.name(), unit = %unit, "Provisioning");
        let outcome = provision::execute(&pipeline, unit, &run, Arc::new(event_sink())).await;
        report::print(&outcome, run.output)?;

        let code = outcome.exit_code();
        debug!(exit_code = code, "Run finished");
        Ok(code)
    }
}

/// Lifecycle events go to debug; stage progress is already logged at info.
fn event_sink() -> LoggingEventSink {
    LoggingEventSink::default()
}

/// Resolves flags into a validated pipeline backed by the real CLIs.
fn prepare(command: Command, run: &RunConfig) -> Result<(Pipeline, DeployableUnit), ProvisionError> {
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::new());
    let prompter: Arc<dyn Prompter> = Arc::new(TerminalPrompter);

    match command {
        Command::Sdkr {
            command: ContainerCommand::Provision(args),
        } => {
            let config = args.into_config()?;
            let tools = ContainerToolchain::docker(DockerCli::new(runner));
            Ok((container_pipeline(&config, &tools, run, prompter)?, config.unit()))
        }
        Command::Selm {
            command: ChartCommand::Provision(args),
        } => {
            let config = args.into_config()?;
            let tools = ChartToolchain::helm(HelmCli::new(runner));
            Ok((chart_pipeline(&config, &tools)?, config.unit()))
        }
        Command::Stf {
            command: InfraCommand::Provision(args),
        } => {
            let config = args.into_config()?;
            let tools = InfraToolchain::terraform(TerraformCli::new(runner));
            Ok((infra_pipeline(&config, &tools, run, prompter)?, config.unit()))
        }
    }
}
