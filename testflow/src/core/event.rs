//! Workflow lifecycle events delivered to event sinks.

use super::{Phase, StageId};
use crate::state::RunId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A run was accepted and seeded.
    #[serde(rename = "run.started")]
    RunStarted,
    /// A run continued from a checkpoint.
    #[serde(rename = "run.resumed")]
    RunResumed,
    /// A stage began executing.
    #[serde(rename = "stage.started")]
    StageStarted,
    /// A stage finished and its update was merged.
    #[serde(rename = "stage.completed")]
    StageCompleted,
    /// A stage failed.
    #[serde(rename = "stage.failed")]
    StageFailed,
    /// A checkpoint was written.
    #[serde(rename = "checkpoint.saved")]
    CheckpointSaved,
    /// A run produced its result.
    #[serde(rename = "run.completed")]
    RunCompleted,
    /// A run terminated with an error.
    #[serde(rename = "run.failed")]
    RunFailed,
}

impl EventKind {
    /// Returns the dotted event type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "run.started",
            Self::RunResumed => "run.resumed",
            Self::StageStarted => "stage.started",
            Self::StageCompleted => "stage.completed",
            Self::StageFailed => "stage.failed",
            Self::CheckpointSaved => "checkpoint.saved",
            Self::RunCompleted => "run.completed",
            Self::RunFailed => "run.failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event emitted by the executor during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// The event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// The run this event belongs to.
    pub run_id: RunId,

    /// The stage, for stage-scoped events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageId>,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
}

impl WorkflowEvent {
    /// Creates a new event for a run.
    #[must_use]
    pub fn new(kind: EventKind, run_id: RunId) -> Self {
        Self {
            kind,
            run_id,
            stage: None,
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Scopes the event to a stage.
    #[must_use]
    pub fn for_stage(mut self, stage: StageId) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Creates a "run.started" event.
    #[must_use]
    pub fn run_started(run_id: RunId, source_len: usize) -> Self {
        Self::new(EventKind::RunStarted, run_id).add_data("source_len", serde_json::json!(source_len))
    }

    /// Creates a "run.resumed" event.
    #[must_use]
    pub fn run_resumed(run_id: RunId, last_stage: StageId) -> Self {
        Self::new(EventKind::RunResumed, run_id)
            .add_data("last_stage", serde_json::json!(last_stage.as_str()))
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn stage_started(run_id: RunId, stage: StageId) -> Self {
        Self::new(EventKind::StageStarted, run_id).for_stage(stage)
    }

    /// Creates a "stage.completed" event.
    #[must_use]
    pub fn stage_completed(run_id: RunId, stage: StageId, duration_ms: f64) -> Self {
        Self::new(EventKind::StageCompleted, run_id)
            .for_stage(stage)
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "stage.failed" event.
    #[must_use]
    pub fn stage_failed(run_id: RunId, stage: StageId, error: &str) -> Self {
        Self::new(EventKind::StageFailed, run_id)
            .for_stage(stage)
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "checkpoint.saved" event.
    #[must_use]
    pub fn checkpoint_saved(run_id: RunId, stage: StageId) -> Self {
        Self::new(EventKind::CheckpointSaved, run_id).for_stage(stage)
    }

    /// Creates a "run.completed" event.
    #[must_use]
    pub fn run_completed(run_id: RunId, duration_ms: f64, result_len: usize) -> Self {
        Self::new(EventKind::RunCompleted, run_id)
            .add_data("duration_ms", serde_json::json!(duration_ms))
            .add_data("result_len", serde_json::json!(result_len))
    }

    /// Creates a "run.failed" event.
    #[must_use]
    pub fn run_failed(run_id: RunId, phase: Phase, error: &str) -> Self {
        let event = Self::new(EventKind::RunFailed, run_id)
            .add_data("phase", serde_json::json!(phase.as_str()))
            .add_data("error", serde_json::json!(error));
        match phase.stage() {
            Some(stage) => event.for_stage(stage),
            None => event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_started_event() {
        let run_id = RunId::new();
        let event = WorkflowEvent::stage_started(run_id, StageId::Context);
        assert_eq!(event.kind, EventKind::StageStarted);
        assert_eq!(event.stage, Some(StageId::Context));
        assert_eq!(event.run_id, run_id);
    }

    #[test]
    fn test_stage_completed_event() {
        let event = WorkflowEvent::stage_completed(RunId::new(), StageId::Dependency, 12.5);
        assert_eq!(event.data.get("duration_ms"), Some(&serde_json::json!(12.5)));
    }

    #[test]
    fn test_run_failed_scopes_stage_phase() {
        let event = WorkflowEvent::run_failed(
            RunId::new(),
            Phase::Stage(StageId::Generation),
            "boom",
        );
        assert_eq!(event.stage, Some(StageId::Generation));
        assert_eq!(event.data.get("phase"), Some(&serde_json::json!("generation")));

        let event = WorkflowEvent::run_failed(RunId::new(), Phase::Execution, "boom");
        assert_eq!(event.stage, None);
    }

    #[test]
    fn test_event_serialization_uses_dotted_type() {
        let event = WorkflowEvent::run_started(RunId::new(), 42);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "run.started");
        assert_eq!(json["data"]["source_len"], 42);
    }
}
