//! Concrete provisioning pipelines for the three domains.
//!
//! Each assembly is a declarative list of steps built once per invocation
//! from an explicit configuration struct and a toolchain of collaborators:
//!
//! - [`container_pipeline`]: build, verify (scan + tag), confirm, push,
//!   optionally remove the local image.
//! - [`chart_pipeline`]: install or upgrade depending on whether the release
//!   exists, then validate (lint + template).
//! - [`infra_pipeline`]: init, inspect (drift + plan), confirm, apply, read
//!   outputs.

mod chart;
mod container;
mod infra;
pub mod validate;

pub use chart::{chart_pipeline, ChartConfig, ChartToolchain};
pub use container::{container_pipeline, ContainerConfig, ContainerToolchain, Destination};
pub use infra::{infra_pipeline, InfraConfig, InfraToolchain};

use crate::context::{PipelineContext, RunIdentity};
use crate::core::DeployableUnit;
use crate::errors::ProvisionError;
use crate::events::EventSink;
use crate::pipeline::{GateOptions, Pipeline, RunOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How the run report is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per recorded result.
    #[default]
    Human,
    /// The full run record as JSON.
    Json,
}

/// Settings shared by every domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Approve every confirmation gate without prompting.
    pub auto_approve: bool,
    /// Deadline for the whole run, in seconds.
    pub timeout_secs: Option<u64>,
    pub output: OutputFormat,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.timeout_secs == Some(0) {
            return Err(crate::errors::ConfigurationError::new("timeout must be at least one second")
                .with_field("timeout")
                .into());
        }
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub const fn gate_options(&self) -> GateOptions {
        GateOptions {
            auto_approve: self.auto_approve,
        }
    }
}

/// Runs `pipeline` for `unit` under one fresh context.
///
/// The run is bound to the configured deadline and to Ctrl-C; both cancel
/// the run's token.
pub async fn execute(
    pipeline: &Pipeline,
    unit: DeployableUnit,
    run: &RunConfig,
    sink: Arc<dyn EventSink>,
) -> RunOutcome {
    let ctx = Arc::new(
        PipelineContext::new(RunIdentity::new(pipeline.name()), unit).with_event_sink(sink),
    );

    let deadline = run.timeout().map(|timeout| ctx.cancel_token().cancel_after(timeout));
    let interrupt = {
        let token = Arc::clone(ctx.cancel_token());
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel("interrupted");
            }
        })
    };

    debug!(run_id = %ctx.run_id(), pipeline = %pipeline.name(), "Executing pipeline");
    let outcome = pipeline.run(Arc::clone(&ctx)).await;

    interrupt.abort();
    if let Some(timer) = deadline {
        timer.abort();
    }
    outcome
}

/// Debug for stage structs holding collaborator trait objects.
macro_rules! opaque_debug {
    ($($ty:ident),+ $(,)?) => {$(
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty)).finish_non_exhaustive()
            }
        }
    )+};
}
pub(crate) use opaque_debug;
