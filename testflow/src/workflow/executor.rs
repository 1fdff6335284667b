//! Workflow execution.

use super::{Node, WorkflowBuilder, WorkflowGraph};
use crate::cancellation::CancellationToken;
use crate::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
use crate::config::TestflowConfig;
use crate::core::{StageId, WorkflowEvent};
use crate::errors::{StageError, WorkflowError};
use crate::events::{EventSink, LoggingEventSink, ProgressChannel};
use crate::extract::FAILURE_PREFIX;
use crate::llm::LlmClient;
use crate::observability::{run_span, stage_span, SpanTimer};
use crate::stages::{ContextStage, DependencyStage, GenerationStage, Stage};
use crate::state::{fields, Role, RunId, SessionState, StateUpdate};
use crate::tools::ToolSet;
use dashmap::DashSet;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};

/// The result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The run identifier, usable with [`WorkflowExecutor::resume`].
    pub run_id: RunId,
    /// The generated artifact.
    pub result: String,
    /// Stages executed by this call, in order. Empty when a resumed run was
    /// already complete.
    pub stages_completed: Vec<StageId>,
    /// Wall-clock duration of this call in milliseconds.
    pub duration_ms: f64,
}

/// Input of a single run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    source: String,
    run_id: Option<RunId>,
    cancellation: Option<Arc<CancellationToken>>,
}

impl RunRequest {
    /// Creates a request for `source` with a fresh run id.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            run_id: None,
            cancellation: None,
        }
    }

    /// Uses a caller-chosen run id, e.g. one from [`RunId::derive`].
    #[must_use]
    pub const fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Runs the stage graph for one source text at a time per run id.
///
/// Stages run strictly in order on the calling task. After each successful
/// stage the update is merged, the state is checkpointed and one progress
/// event is emitted. Any failure is reported exactly once on the error
/// channel and ends the run.
pub struct WorkflowExecutor {
    graph: WorkflowGraph,
    stages: BTreeMap<StageId, Arc<dyn Stage>>,
    store: Arc<dyn CheckpointStore>,
    channel: Arc<ProgressChannel>,
    sink: Arc<dyn EventSink>,
    stage_timeout: Option<Duration>,
    active: DashSet<RunId>,
}

/// Marks a run id as active until dropped.
struct ActiveRun<'a> {
    active: &'a DashSet<RunId>,
    run_id: RunId,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.run_id);
    }
}

impl WorkflowExecutor {
    pub(super) fn new(
        graph: WorkflowGraph,
        stages: BTreeMap<StageId, Arc<dyn Stage>>,
        store: Arc<dyn CheckpointStore>,
        channel: Arc<ProgressChannel>,
        sink: Arc<dyn EventSink>,
        stage_timeout: Option<Duration>,
    ) -> Self {
        Self {
            graph,
            stages,
            store,
            channel,
            sink,
            stage_timeout,
            active: DashSet::new(),
        }
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    /// Builds the standard model-backed workflow from configuration.
    ///
    /// When a project root is configured and tools are enabled, the
    /// dependency stage gets the build manifest tool and the context stage
    /// gets the source lookup tools. Checkpoints go to
    /// `workflow.checkpoint_dir` if set, otherwise to memory.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Initialization`] if the graph cannot be built.
    pub fn standard(
        client: Arc<dyn LlmClient>,
        config: &TestflowConfig,
        channel: Arc<ProgressChannel>,
    ) -> Result<Self, WorkflowError> {
        let rounds = config.llm.max_tool_rounds;
        let mut dependency = DependencyStage::new(Arc::clone(&client))
            .with_target(config.target.clone())
            .with_max_tool_rounds(rounds);
        let mut context = ContextStage::new(Arc::clone(&client))
            .with_target(config.target.clone())
            .with_max_tool_rounds(rounds);
        if let Some(root) = config.tools.active_root() {
            dependency = dependency.with_tools(Arc::new(ToolSet::dependency_tools(root)));
            context = context.with_tools(Arc::new(ToolSet::context_tools(
                root,
                &config.tools.source_extension,
            )));
        }
        let generation = GenerationStage::new(client).with_target(config.target.clone());

        let store: Arc<dyn CheckpointStore> = match &config.workflow.checkpoint_dir {
            Some(dir) => Arc::new(FileCheckpointStore::new(dir)),
            None => Arc::new(MemoryCheckpointStore::new()),
        };

        WorkflowBuilder::new()
            .stage(dependency)
            .stage(context)
            .stage(generation)
            .checkpoint_store(store)
            .channel(channel)
            .event_sink(Arc::new(LoggingEventSink::debug()))
            .stage_timeout(config.workflow.stage_timeout())
            .build()
    }

    /// Returns the stage graph.
    #[must_use]
    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Returns the progress/error channel.
    #[must_use]
    pub fn channel(&self) -> &Arc<ProgressChannel> {
        &self.channel
    }

    /// Returns the checkpoint store.
    #[must_use]
    pub fn checkpoint_store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Returns true if a run with this id is currently executing.
    #[must_use]
    pub fn is_active(&self, run_id: &RunId) -> bool {
        self.active.contains(run_id)
    }

    /// Runs the workflow over `source` with a fresh run id.
    ///
    /// # Errors
    ///
    /// Returns the single [`WorkflowError`] that ended the run.
    pub async fn run(&self, source: &str) -> Result<RunOutcome, WorkflowError> {
        self.run_request(RunRequest::new(source)).await
    }

    /// Runs the workflow for a request.
    ///
    /// # Errors
    ///
    /// Returns the single [`WorkflowError`] that ended the run.
    pub async fn run_request(&self, request: RunRequest) -> Result<RunOutcome, WorkflowError> {
        let run_id = request.run_id.unwrap_or_else(RunId::new);
        let token = request.cancellation.unwrap_or_default();
        let timer = SpanTimer::start("workflow_run");

        let result = self
            .start_run(run_id, &request.source, &token, &timer)
            .instrument(run_span(run_id))
            .await;
        self.finish(run_id, result, timer).await
    }

    /// Continues a run from its last checkpoint.
    ///
    /// Completed stages are skipped. A run whose checkpoint is already past
    /// the last stage returns its stored result without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::CheckpointNotFound`] for unknown runs, or the
    /// single error that ended the resumed run.
    pub async fn resume(&self, run_id: RunId) -> Result<RunOutcome, WorkflowError> {
        self.resume_with(run_id, Arc::default()).await
    }

    /// Continues a run from its last checkpoint under a cancellation token.
    ///
    /// # Errors
    ///
    /// See [`resume`](Self::resume).
    pub async fn resume_with(
        &self,
        run_id: RunId,
        token: Arc<CancellationToken>,
    ) -> Result<RunOutcome, WorkflowError> {
        let timer = SpanTimer::start("workflow_resume");
        let result = self
            .resume_run(run_id, &token, &timer)
            .instrument(run_span(run_id))
            .await;
        self.finish(run_id, result, timer).await
    }

    /// Runs the workflow and returns a single string: the generated artifact,
    /// or a failure string starting with [`FAILURE_PREFIX`].
    pub async fn execute(&self, source: &str) -> String {
        match self.run(source).await {
            Ok(outcome) => outcome.result,
            Err(err) => failure_string(&err),
        }
    }

    /// Runs the workflow on a dedicated task.
    pub fn spawn(
        self: &Arc<Self>,
        source: impl Into<String>,
    ) -> JoinHandle<Result<RunOutcome, WorkflowError>> {
        let executor = Arc::clone(self);
        let source = source.into();
        tokio::spawn(async move { executor.run(&source).await })
    }

    async fn start_run(
        &self,
        run_id: RunId,
        source: &str,
        token: &CancellationToken,
        timer: &SpanTimer,
    ) -> Result<RunOutcome, WorkflowError> {
        if source.trim().is_empty() {
            return Err(WorkflowError::Consistency(
                "empty input: the source text is blank".to_string(),
            ));
        }
        let _active = self.claim(run_id)?;

        info!(run_id = %run_id, source_chars = source.len(), "Workflow run started");
        self.sink
            .emit(&WorkflowEvent::run_started(run_id, source.len()))
            .await;

        self.drive(run_id, SessionState::seed(source), Node::Start, token, timer)
            .await
    }

    async fn resume_run(
        &self,
        run_id: RunId,
        token: &CancellationToken,
        timer: &SpanTimer,
    ) -> Result<RunOutcome, WorkflowError> {
        let _active = self.claim(run_id)?;

        let record = self
            .store
            .load(&run_id)
            .await?
            .ok_or(WorkflowError::CheckpointNotFound(run_id))?;
        if !record.is_intact() {
            return Err(WorkflowError::Consistency(format!(
                "checkpoint for run {run_id} does not match its recorded source digest"
            )));
        }

        info!(run_id = %run_id, last_stage = %record.last_stage, "Workflow run resumed");
        self.sink
            .emit(&WorkflowEvent::run_resumed(run_id, record.last_stage))
            .await;

        self.drive(
            run_id,
            record.state,
            Node::Stage(record.last_stage),
            token,
            timer,
        )
        .await
    }

    fn claim(&self, run_id: RunId) -> Result<ActiveRun<'_>, WorkflowError> {
        if self.active.insert(run_id) {
            Ok(ActiveRun {
                active: &self.active,
                run_id,
            })
        } else {
            Err(WorkflowError::RunInProgress(run_id))
        }
    }

    /// Walks the graph from the successor of `from` until it reaches `End`
    /// or `Aborted`.
    async fn drive(
        &self,
        run_id: RunId,
        mut state: SessionState,
        from: Node,
        token: &CancellationToken,
        timer: &SpanTimer,
    ) -> Result<RunOutcome, WorkflowError> {
        let mut completed = Vec::new();
        let mut failure = None;
        let mut node = self.graph.successor(from);

        while let Node::Stage(stage_id) = node {
            match self.step(run_id, stage_id, &state, token).await {
                Ok(next) => {
                    state = next;
                    completed.push(stage_id);
                    node = self.graph.transition(node, true);
                }
                Err(err) => {
                    failure = Some(err);
                    node = self.graph.transition(node, false);
                    debug!(run_id = %run_id, stage = %stage_id, node = %node, "Run aborted");
                }
            }
        }

        match (node, failure) {
            (_, Some(err)) => Err(err),
            (Node::End, None) => Ok(RunOutcome {
                run_id,
                result: terminal_result(&state)?,
                stages_completed: completed,
                duration_ms: timer.elapsed_ms(),
            }),
            (other, None) => Err(WorkflowError::Consistency(format!(
                "run stopped at {other} without an error"
            ))),
        }
    }

    /// Runs one stage, then merges, checkpoints and reports its update.
    async fn step(
        &self,
        run_id: RunId,
        stage_id: StageId,
        state: &SessionState,
        token: &CancellationToken,
    ) -> Result<SessionState, WorkflowError> {
        if token.is_cancelled() {
            return Err(cancelled(token));
        }
        let stage = self.stages.get(&stage_id).ok_or_else(|| {
            WorkflowError::Initialization(format!("no stage bound for '{stage_id}'"))
        })?;

        self.sink
            .emit(&WorkflowEvent::stage_started(run_id, stage_id))
            .await;
        let stage_timer = SpanTimer::start(stage_id.as_str());

        let update = match self
            .run_stage(stage.as_ref(), state, token)
            .instrument(stage_span(run_id, stage_id))
            .await
            .and_then(|update| keep_source(stage_id, state, update))
        {
            Ok(update) => update,
            Err(err) => {
                self.sink
                    .emit(&WorkflowEvent::stage_failed(run_id, stage_id, &err.to_string()))
                    .await;
                return Err(err);
            }
        };

        let state = state.clone().merge(update);
        self.store.save(run_id, stage_id, &state).await?;
        self.sink
            .emit(&WorkflowEvent::checkpoint_saved(run_id, stage_id))
            .await;

        let duration_ms = stage_timer.finish();
        info!(run_id = %run_id, stage = %stage_id, duration_ms, "Stage completed");
        self.sink
            .emit(&WorkflowEvent::stage_completed(run_id, stage_id, duration_ms))
            .await;
        self.channel.notify_progress(stage_id);

        Ok(state)
    }

    /// Runs one stage under the timeout, racing the cancellation token.
    async fn run_stage(
        &self,
        stage: &dyn Stage,
        state: &SessionState,
        token: &CancellationToken,
    ) -> Result<StateUpdate, WorkflowError> {
        let id = stage.id();
        debug!(stage = %id, fields = state.field_names().count(), "Running stage");

        let call = async {
            let guarded = AssertUnwindSafe(stage.run(state)).catch_unwind();
            let outcome = match self.stage_timeout {
                Some(limit) => match tokio::time::timeout(limit, guarded).await {
                    Ok(outcome) => outcome,
                    Err(_) => return Err(WorkflowError::Timeout { stage: id, after: limit }),
                },
                None => guarded.await,
            };
            match outcome {
                Ok(result) => result.map_err(WorkflowError::from_stage_error),
                Err(_) => Err(WorkflowError::StageExecution(StageError::message(
                    id,
                    "stage panicked",
                ))),
            }
        };

        tokio::select! {
            biased;
            () = token.cancelled() => Err(cancelled(token)),
            result = call => result,
        }
    }

    async fn finish(
        &self,
        run_id: RunId,
        result: Result<RunOutcome, WorkflowError>,
        timer: SpanTimer,
    ) -> Result<RunOutcome, WorkflowError> {
        let duration_ms = timer.finish();
        match result {
            Ok(outcome) => {
                info!(
                    run_id = %run_id,
                    duration_ms,
                    result_chars = outcome.result.len(),
                    "Workflow run completed"
                );
                self.sink
                    .emit(&WorkflowEvent::run_completed(
                        run_id,
                        duration_ms,
                        outcome.result.len(),
                    ))
                    .await;
                Ok(outcome)
            }
            Err(err) => {
                let graph_error = err.to_graph_error();
                error!(
                    run_id = %run_id,
                    phase = graph_error.phase_name(),
                    duration_ms,
                    "Workflow run failed: {}",
                    err
                );
                self.channel.notify_error(&graph_error);
                self.sink
                    .emit(&WorkflowEvent::run_failed(run_id, err.phase(), &err.to_string()))
                    .await;
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("graph", &self.graph)
            .field("stages", &self.stages.keys().collect::<Vec<_>>())
            .field("store", &self.store)
            .field("stage_timeout", &self.stage_timeout)
            .field("active_runs", &self.active.len())
            .finish_non_exhaustive()
    }
}

fn cancelled(token: &CancellationToken) -> WorkflowError {
    WorkflowError::Cancelled(token.reason().unwrap_or_else(|| "cancelled".to_string()))
}

/// Rejects an update that would change the source text.
///
/// A stage may re-emit `code`, but only with the value it was given.
fn keep_source(
    stage: StageId,
    state: &SessionState,
    update: StateUpdate,
) -> Result<StateUpdate, WorkflowError> {
    match update.get(fields::CODE) {
        Some(code) if state.get(fields::CODE) != Some(code) => Err(
            WorkflowError::StageExecution(StageError::message(
                stage,
                "stage changed the source text in 'code'",
            )),
        ),
        _ => Ok(update),
    }
}

/// Reads the result from the last message appended after the seed.
fn terminal_result(state: &SessionState) -> Result<String, WorkflowError> {
    let message = state
        .terminal_message()
        .ok_or_else(|| WorkflowError::Consistency("no result produced".to_string()))?;
    match message.role {
        Role::User | Role::Assistant => Ok(message.content.clone()),
        other => Err(WorkflowError::Consistency(format!(
            "unexpected terminal message role '{other}'"
        ))),
    }
}

/// Formats an error as the failure string returned by
/// [`WorkflowExecutor::execute`].
#[must_use]
pub fn failure_string(err: &WorkflowError) -> String {
    format!("{FAILURE_PREFIX}[{}] {err}", err.phase())
}
