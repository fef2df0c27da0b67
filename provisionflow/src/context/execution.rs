//! Execution contexts for pipeline and stage execution.

use super::RunIdentity;
use crate::cancellation::CancellationToken;
use crate::core::{ConfirmationDecision, DeployableUnit};
use crate::events::{EventSink, LoggingEventSink};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// The context for one pipeline invocation.
///
/// Created once per invocation and shared read-only with every stage. The
/// only value written after construction is the confirmation decision,
/// which can be set exactly once.
pub struct PipelineContext {
    /// Run identity.
    identity: RunIdentity,
    /// Target of the run.
    unit: DeployableUnit,
    /// Cancellation token shared by every stage.
    cancel_token: Arc<CancellationToken>,
    /// Event sink for emitting events.
    event_sink: Arc<dyn EventSink>,
    /// Confirmation decision, decided at most once.
    confirmation: OnceLock<ConfirmationDecision>,
}

impl PipelineContext {
    /// Creates a new pipeline context.
    #[must_use]
    pub fn new(identity: RunIdentity, unit: DeployableUnit) -> Self {
        Self {
            identity,
            unit,
            cancel_token: Arc::new(CancellationToken::new()),
            event_sink: Arc::new(LoggingEventSink::default()),
            confirmation: OnceLock::new(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel_token = token;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub const fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the run ID.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.identity.run_id
    }

    /// Returns the deployable unit.
    #[must_use]
    pub const fn unit(&self) -> &DeployableUnit {
        &self.unit
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel_token
    }

    /// Checks if the run is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Emits an event without blocking.
    pub fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.event_sink.try_emit(event_type, data);
    }

    /// Returns the confirmation decision, if one has been taken.
    #[must_use]
    pub fn confirmation(&self) -> Option<ConfirmationDecision> {
        self.confirmation.get().copied()
    }

    /// Records the confirmation decision.
    ///
    /// The first decision wins; the decision actually in effect is returned.
    pub fn decide_confirmation(&self, decision: ConfirmationDecision) -> ConfirmationDecision {
        *self.confirmation.get_or_init(|| decision)
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("identity", &self.identity)
            .field("unit", &self.unit)
            .field("cancelled", &self.is_cancelled())
            .field("confirmation", &self.confirmation())
            .finish_non_exhaustive()
    }
}

/// The context handed to a single stage invocation.
#[derive(Debug, Clone)]
pub struct StageContext {
    pipeline: Arc<PipelineContext>,
    stage_name: String,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(pipeline: Arc<PipelineContext>, stage_name: impl Into<String>) -> Self {
        Self {
            pipeline,
            stage_name: stage_name.into(),
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the enclosing pipeline context.
    #[must_use]
    pub const fn pipeline(&self) -> &Arc<PipelineContext> {
        &self.pipeline
    }

    /// Returns the deployable unit.
    #[must_use]
    pub fn unit(&self) -> &DeployableUnit {
        self.pipeline.unit()
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        self.pipeline.cancel_token()
    }

    /// Checks if the run is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.pipeline.is_cancelled()
    }

    /// Returns the confirmation decision already taken for this run.
    #[must_use]
    pub fn confirmation(&self) -> Option<ConfirmationDecision> {
        self.pipeline.confirmation()
    }

    /// Emits an event tagged with this stage's name.
    pub fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut payload = data.unwrap_or_else(|| serde_json::json!({}));
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("stage".to_string(), serde_json::json!(self.stage_name));
        }
        self.pipeline.try_emit_event(event_type, Some(payload));
    }
}
