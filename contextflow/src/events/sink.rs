//! Event sink trait and implementations.

use super::PipelineEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Receives pipeline events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    async fn emit(&self, event: PipelineEvent);
}

/// Discards all events. The engine's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: PipelineEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink. DEBUG and TRACE log at debug level, everything else at info.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: PipelineEvent) {
        if self.level <= Level::INFO {
            info!(event_type = %event.event_type, data = %event.data, "Pipeline event");
        } else {
            debug!(event_type = %event.event_type, data = %event.data, "Pipeline event");
        }
    }
}

/// Records events in memory. Intended for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns collected event types, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Returns events whose type starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.emit(PipelineEvent::new("x", json!(null))).await;
        LoggingEventSink::default()
            .emit(PipelineEvent::new("stage.started", json!({"stage": "a"})))
            .await;
        LoggingEventSink::debug()
            .emit(PipelineEvent::new("stage.completed", json!({})))
            .await;
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(PipelineEvent::new("stage.started", json!({"stage": "a"}))).await;
        sink.emit(PipelineEvent::new("pipeline.completed", json!({}))).await;

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.event_types(), vec!["stage.started", "pipeline.completed"]);
        assert_eq!(sink.events_of_type("stage.")[0].stage(), Some("a"));

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_collecting_sink_through_trait_object() {
        let sink = std::sync::Arc::new(CollectingEventSink::new());
        let dyn_sink: std::sync::Arc<dyn EventSink> = sink.clone();

        tokio_test::block_on(dyn_sink.emit(PipelineEvent::new("pipeline.started", json!({}))));

        assert_eq!(sink.event_types(), vec!["pipeline.started"]);
    }
}
