//! Per-invocation context types.
//!
//! This module provides:
//! - RunIdentity for correlating one invocation
//! - PipelineContext shared read-only by every stage of a run
//! - StageContext handed to a single stage invocation

mod execution;
mod identity;

pub use execution::{PipelineContext, StageContext};
pub use identity::RunIdentity;
