//! Workflow builder with validation.

use super::{WorkflowExecutor, WorkflowGraph};
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use crate::core::StageId;
use crate::errors::WorkflowError;
use crate::events::{EventSink, NoOpEventSink, ProgressChannel};
use crate::stages::Stage;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Builder for creating validated workflow executors.
///
/// Defaults: in-memory checkpoints, a fresh progress channel, no event sink
/// and no stage timeout.
#[derive(Default)]
pub struct WorkflowBuilder {
    stages: Vec<Arc<dyn Stage>>,
    store: Option<Arc<dyn CheckpointStore>>,
    channel: Option<Arc<ProgressChannel>>,
    sink: Option<Arc<dyn EventSink>>,
    stage_timeout: Option<Duration>,
}

impl std::fmt::Debug for WorkflowBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowBuilder")
            .field("stages", &self.stages)
            .field("store", &self.store)
            .field("stage_timeout", &self.stage_timeout)
            .finish_non_exhaustive()
    }
}

impl WorkflowBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a stage to the slot named by its id.
    #[must_use]
    pub fn stage(self, stage: impl Stage + 'static) -> Self {
        self.shared_stage(Arc::new(stage))
    }

    /// Binds a shared stage.
    #[must_use]
    pub fn shared_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the checkpoint store.
    #[must_use]
    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the progress/error channel.
    #[must_use]
    pub fn channel(mut self, channel: Arc<ProgressChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the per-stage timeout. `None` disables it.
    #[must_use]
    pub const fn stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Returns the number of stages bound so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the executor.
    ///
    /// A validation failure is also reported once on the error channel, with
    /// phase `initialization`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Initialization`] unless every stage of the graph
    /// is bound exactly once.
    pub fn build(self) -> Result<WorkflowExecutor, WorkflowError> {
        let graph = WorkflowGraph::linear();
        let channel = self.channel.unwrap_or_default();

        let ids: Vec<StageId> = self.stages.iter().map(|s| s.id()).collect();
        if let Err(err) = graph.validate(&ids) {
            error!(error = %err, "Workflow construction failed");
            channel.notify_error(&err.to_graph_error());
            return Err(err);
        }

        let stages: BTreeMap<StageId, Arc<dyn Stage>> =
            self.stages.into_iter().map(|s| (s.id(), s)).collect();

        Ok(WorkflowExecutor::new(
            graph,
            stages,
            self.store
                .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::new())),
            channel,
            self.sink.unwrap_or_else(|| Arc::new(NoOpEventSink)),
            self.stage_timeout,
        ))
    }
}
