//! Final stage: test generation.

use super::{model_failure, required_code, Stage, TestTarget};
use super::{GENERATION_SYSTEM, GENERATION_USER};
use crate::core::StageId;
use crate::errors::StageError;
use crate::extract::{extract_artifact, validate_artifact};
use crate::llm::{LlmClient, ToolLoop};
use crate::state::{fields, Message, SessionState, StateUpdate};
use crate::stages::render_prompt;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Writes the test file from the source and both analyses.
///
/// The model's answer is run through the output extractor; the artifact is
/// appended as the terminal assistant message. Output that is empty, a
/// placeholder, or an error report fails with an output validation error.
#[derive(Debug, Clone)]
pub struct GenerationStage {
    conversation: ToolLoop,
    target: TestTarget,
}

impl GenerationStage {
    /// Creates the stage over a model client.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            conversation: ToolLoop::new(client),
            target: TestTarget::default(),
        }
    }

    /// Sets the test target.
    #[must_use]
    pub fn with_target(mut self, target: TestTarget) -> Self {
        self.target = target;
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.conversation = self.conversation.with_temperature(temperature);
        self
    }
}

#[async_trait]
impl Stage for GenerationStage {
    fn id(&self) -> StageId {
        StageId::Generation
    }

    async fn run(&self, state: &SessionState) -> Result<StateUpdate, StageError> {
        let code = required_code(self.id(), state)?;
        let system = self.target.render(GENERATION_SYSTEM);
        let user = render_prompt(
            GENERATION_USER,
            &[
                ("code", code),
                (
                    fields::DEPENDENCY_ANALYSIS,
                    state.get_or_default(fields::DEPENDENCY_ANALYSIS),
                ),
                (
                    fields::CONTEXT_ANALYSIS,
                    state.get_or_default(fields::CONTEXT_ANALYSIS),
                ),
            ],
        );
        debug!(stage = %self.id(), prompt_chars = user.len(), "Requesting test generation");

        let raw = self
            .conversation
            .run(&system, &user)
            .await
            .map_err(|e| model_failure(self.id(), e))?;

        let artifact = extract_artifact(&raw);
        if let Err(problem) = validate_artifact(&artifact) {
            warn!(stage = %self.id(), raw_chars = raw.len(), "Rejected generated output: {}", problem);
            return Err(StageError::output_validation(self.id(), problem));
        }
        info!(stage = %self.id(), chars = artifact.len(), "Tests generated");

        Ok(StateUpdate::new().append(Message::assistant(artifact)))
    }
}
