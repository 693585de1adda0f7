//! Lifecycle events emitted by the context engine.
//!
//! The engine reports each run through an injected [`EventSink`]. Sinks
//! must never fail the run.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde::{Deserialize, Serialize};

/// Event type names.
pub mod types {
    /// A run started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A stage is about to run.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage returned a context.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage's `should_run` returned false.
    pub const STAGE_SKIPPED: &str = "stage.skipped";
    /// A stage aborted the run.
    pub const PIPELINE_ABORTED: &str = "pipeline.aborted";
    /// The run finished.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A stage failed unexpectedly.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
}

/// An event emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The event type (e.g., "stage.started").
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the event occurred (ISO 8601).
    pub timestamp: String,
    /// Event payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PipelineEvent {
    /// Creates an event with a payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data,
        }
    }

    /// Returns the `stage` field of the payload, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        self.data.get("stage").and_then(serde_json::Value::as_str)
    }
}
