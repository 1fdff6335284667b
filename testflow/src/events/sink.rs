//! Event sink trait and implementations.

use crate::core::{EventKind, WorkflowEvent};
use async_trait::async_trait;
use tracing::{debug, info, Level};

/// Trait for event sinks that receive workflow lifecycle events.
///
/// Sinks are for logging and analytics; they are independent of the progress
/// and error listeners on [`ProgressChannel`](super::ProgressChannel).
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: &WorkflowEvent) {
        self.try_emit(event);
    }

    /// Emits an event without blocking.
    ///
    /// Implementations must not panic or fail; errors are logged and dropped.
    fn try_emit(&self, event: &WorkflowEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: &WorkflowEvent) {}
}

/// An event sink that logs events using the tracing framework.
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
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub const fn info() -> Self {
        Self::new(Level::INFO)
    }

    fn log_event(&self, event: &WorkflowEvent) {
        let stage = event.stage.map_or("-", |s| s.as_str());
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.kind,
                run_id = %event.run_id,
                stage = stage,
                event_data = ?event.data,
                "Event: {}", event.kind
            );
        } else {
            info!(
                event_type = %event.kind,
                run_id = %event.run_id,
                stage = stage,
                event_data = ?event.data,
                "Event: {}", event.kind
            );
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: &WorkflowEvent) {
        self.log_event(event);
    }
}

/// A collecting event sink for testing and inspection.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<WorkflowEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.read().clone()
    }

    /// Returns the kinds of all collected events, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.read().iter().map(|e| e.kind).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events of the given kind.
    #[must_use]
    pub fn events_of_kind(&self, kind: EventKind) -> Vec<WorkflowEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: &WorkflowEvent) {
        self.events.write().push(event.clone());
    }
}
