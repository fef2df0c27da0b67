//! Pipeline composition and execution.
//!
//! A [`Pipeline`] is a list of [`Step`]s run strictly in order:
//!
//! - a single [`Stage`](crate::stages::Stage);
//! - a [`ParallelGroup`] whose members run concurrently and are joined,
//!   with every member failure collected by the [`ErrorAggregator`];
//! - a [`ConfirmationGate`] that decides once whether irreversible steps
//!   may run;
//! - an [`ExistenceBranch`] that picks install or upgrade;
//! - a gated step, which runs only after an approved confirmation and is
//!   otherwise recorded as skipped.

mod branch;
mod builder;
mod execute;
mod gate;
mod group;
mod sequential;
mod step;

mod integration_tests;

pub use branch::{ExistenceBranch, StageFactory};
pub use builder::PipelineBuilder;
pub use gate::{ConfirmationContext, ConfirmationGate, GateOptions, Prompter, TerminalPrompter};
pub use group::{ErrorAggregator, GroupOutcome, ParallelGroup, NOT_STARTED_REASON};
pub use sequential::{Pipeline, RunOutcome, DECLINED_REASON};
pub use step::Step;
