//! Context fixtures.

use crate::context::{PipelineContext, RunIdentity};
use crate::core::{DeployableUnit, DestinationKind};
use crate::events::CollectingEventSink;
use std::sync::Arc;

/// The image unit used across container tests.
#[must_use]
pub fn container_unit() -> DeployableUnit {
    DeployableUnit::image("web", DestinationKind::Hub)
}

/// The release unit used across chart tests.
#[must_use]
pub fn release_unit() -> DeployableUnit {
    DeployableUnit::release("web", "prod")
}

/// The workspace unit used across infrastructure tests.
#[must_use]
pub fn workspace_unit() -> DeployableUnit {
    DeployableUnit::workspace("network", "infra")
}

/// A fresh context for `unit` with the default sink.
#[must_use]
pub fn test_context(unit: DeployableUnit) -> Arc<PipelineContext> {
    Arc::new(PipelineContext::new(RunIdentity::new("test"), unit))
}

/// A fresh context whose events are collected for inspection.
#[must_use]
pub fn collecting_context(unit: DeployableUnit) -> (Arc<PipelineContext>, Arc<CollectingEventSink>) {
    let sink = Arc::new(CollectingEventSink::new());
    let ctx = PipelineContext::new(RunIdentity::new("test"), unit).with_event_sink(sink.clone());
    (Arc::new(ctx), sink)
}
