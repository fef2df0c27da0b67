//! Event sink system for observability.
//!
//! The pipeline emits lifecycle events through the sink carried by its
//! [`PipelineContext`](crate::context::PipelineContext). There is no
//! process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
