//! Core domain model types for provisionflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage outcome and confirmation decision enums
//! - Stage output and recorded stage results
//! - The deployable unit and its scope
//! - The per-invocation pipeline run record

mod output;
mod result;
mod run;
mod status;
mod unit;

pub use output::StageOutput;
pub use result::{ResultKind, StageResult};
pub use run::PipelineRun;
pub use status::{ConfirmationDecision, StageOutcome};
pub use unit::{DeployableUnit, DestinationKind, ExistenceFact, Scope};
