//! Testing utilities for provisionflow pipelines.
//!
//! This module provides:
//! - Recording, failing, slow and panicking stages
//! - A scripted confirmation prompter
//! - Context fixtures

mod fixtures;
mod mocks;
mod prompter;

pub use fixtures::{collecting_context, container_unit, release_unit, test_context, workspace_unit};
pub use mocks::{ExecutionLog, FailingStage, PanickingStage, RecordingStage, SlowStage};
pub use prompter::ScriptedPrompter;
