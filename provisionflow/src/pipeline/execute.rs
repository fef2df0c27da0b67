//! Runs one stage and turns its output into a recorded result.

use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::CollaboratorError;
use crate::stages::Stage;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

/// A finished stage invocation.
#[derive(Debug)]
pub(crate) struct StageRun {
    /// The immutable record of the invocation.
    pub result: StageResult,
    /// The typed error, kept for the sequential spine.
    pub error: Option<CollaboratorError>,
}

pub(crate) async fn run_stage(stage: &dyn Stage, ctx: &StageContext) -> StageRun {
    let name = stage.name();
    let started_at = Utc::now();

    debug!(stage = %name, unit = %ctx.unit(), "Stage started");
    ctx.try_emit_event("stage.started", None);

    match stage.execute(ctx).await {
        Ok(output) => {
            let result = StageResult::from_output(name, started_at, output);
            if result.is_skipped() {
                info!(
                    stage = %name,
                    reason = result.skip_reason.as_deref().unwrap_or_default(),
                    "Stage skipped"
                );
                ctx.try_emit_event(
                    "stage.skipped",
                    Some(json!({ "reason": result.skip_reason })),
                );
            } else {
                info!(stage = %name, duration_ms = result.duration_ms(), "Stage completed");
                ctx.try_emit_event(
                    "stage.completed",
                    Some(json!({ "duration_ms": result.duration_ms() })),
                );
            }
            StageRun { result, error: None }
        }
        Err(err) => {
            warn!(stage = %name, error = %err, "Stage failed");
            ctx.try_emit_event("stage.failed", Some(json!({ "error": err.to_string() })));
            StageRun {
                result: StageResult::failed(name, started_at, err.to_string()),
                error: Some(err),
            }
        }
    }
}
