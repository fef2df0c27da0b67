//! # Provisionflow
//!
//! Staged provisioning for container images, Helm charts and Terraform
//! workspaces.
//!
//! A provisioning run is a short, declarative sequence of steps:
//!
//! - **Stages**: one unit of work backed by an external collaborator
//!   (image builder, chart installer, infrastructure planner)
//! - **Parallel groups**: independent stages forked together and joined
//!   before the next step, with every member failure aggregated
//! - **Confirmation gates**: a single interactive or auto-approved decision
//!   guarding every destructive step of the run
//! - **Existence branches**: install-or-upgrade style choices taken from a
//!   fresh existence check
//!
//! Every step is recorded in a [`core::PipelineRun`]; the first failure
//! stops the run and later steps are never started.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use provisionflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::new("chart")
//!     .branch(ExistenceBranch::new("release-exists", oracle, upgrade, install))
//!     .group(ParallelGroup::new("validate").member(lint).member(template))
//!     .build()?;
//!
//! let outcome = provision::execute(&pipeline, unit, &RunConfig::default(), sink).await;
//! std::process::exit(outcome.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod cli;
pub mod collaborators;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod provision;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{PipelineContext, RunIdentity, StageContext};
    pub use crate::core::{
        ConfirmationDecision, DeployableUnit, DestinationKind, ExistenceFact, PipelineRun,
        ResultKind, Scope, StageOutcome, StageOutput, StageResult,
    };
    pub use crate::errors::{
        AggregatedError, CollaboratorError, ConfigurationError, ProvisionError, StageFailure,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        ConfirmationGate, ExistenceBranch, GateOptions, ParallelGroup, Pipeline,
        PipelineBuilder, Prompter, RunOutcome, Step,
    };
    pub use crate::provision::{self, OutputFormat, RunConfig};
    pub use crate::stages::{FnStage, Stage};
}
