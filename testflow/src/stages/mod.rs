//! Stage trait and implementations.
//!
//! A stage reads the session state and returns a partial update. The three
//! workflow stages wrap a model conversation; [`FnStage`] adapts a closure.

mod context;
mod dependency;
mod generation;
mod prompts;

pub use context::ContextStage;
pub use dependency::DependencyStage;
pub use generation::GenerationStage;
pub use prompts::{
    render_prompt, TestTarget, CONTEXT_SYSTEM, CONTEXT_USER, DEPENDENCY_SYSTEM, DEPENDENCY_USER,
    GENERATION_SYSTEM, GENERATION_USER,
};

use crate::core::StageId;
use crate::errors::{LlmError, StageError};
use crate::state::{fields, SessionState, StateUpdate};
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for workflow stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the slot this stage fills in the workflow.
    fn id(&self) -> StageId;

    /// Runs the stage against the current state.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] tagged with this stage's id.
    async fn run(&self, state: &SessionState) -> Result<StateUpdate, StageError>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&SessionState) -> Result<StateUpdate, StageError> + Send + Sync,
{
    id: StageId,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&SessionState) -> Result<StateUpdate, StageError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub const fn new(id: StageId, func: F) -> Self {
        Self { id, func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&SessionState) -> Result<StateUpdate, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&SessionState) -> Result<StateUpdate, StageError> + Send + Sync,
{
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, state: &SessionState) -> Result<StateUpdate, StageError> {
        (self.func)(state)
    }
}

fn required_code(stage: StageId, state: &SessionState) -> Result<&str, StageError> {
    state
        .get_str(fields::CODE)
        .ok_or_else(|| StageError::missing_field(stage, fields::CODE))
}

fn model_failure(stage: StageId, err: LlmError) -> StageError {
    StageError::new(stage, format!("model call failed: {err}"), err)
}

fn tools_note(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nYou can call these tools to inspect the project: {}.",
            names.join(", ")
        )
    }
}
