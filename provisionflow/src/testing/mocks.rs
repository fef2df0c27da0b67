//! Stage doubles for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::StageContext;
use crate::core::{ConfirmationDecision, StageOutput};
use crate::errors::CollaboratorError;
use crate::stages::Stage;

/// Shared, ordered log of stage names, appended on each execution.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

/// A stage that succeeds and records each call.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    calls: AtomicUsize,
    decisions: Mutex<Vec<Option<ConfirmationDecision>>>,
    log: Option<ExecutionLog>,
}

impl RecordingStage {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
            decisions: Mutex::new(Vec::new()),
            log: None,
        }
    }

    /// Also appends the stage name to `log` on each call.
    #[must_use]
    pub fn with_log(mut self, log: ExecutionLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Returns the number of times the stage ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the confirmation decision visible to each call.
    #[must_use]
    pub fn observed_decisions(&self) -> Vec<Option<ConfirmationDecision>> {
        self.decisions.lock().clone()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.decisions.lock().push(ctx.confirmation());
        if let Some(log) = &self.log {
            log.lock().push(self.name.clone());
        }
        Ok(StageOutput::ok_empty())
    }
}

/// A stage that always fails with [`CollaboratorError::Other`].
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: String,
    calls: AtomicUsize,
}

impl FailingStage {
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CollaboratorError::other(&self.error))
    }
}

/// A stage that sleeps, and stops early if the run is cancelled.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
    completed: AtomicBool,
}

impl SlowStage {
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            completed: AtomicBool::new(false),
        }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }

    /// Returns true if the full delay elapsed.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        tokio::select! {
            () = tokio::time::sleep(self.delay) => {
                self.completed.store(true, Ordering::SeqCst);
                Ok(StageOutput::ok_empty())
            }
            () = ctx.cancel_token().cancelled() => {
                Err(CollaboratorError::Cancelled(ctx.cancel_token().reason_or_default()))
            }
        }
    }
}

/// A stage that panics.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
}

impl PanickingStage {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::panic)]
    async fn execute(&self, _ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        panic!("{} exploded", self.name)
    }
}
