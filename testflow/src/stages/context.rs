//! Second stage: analysis of the class in its project context.

use super::{model_failure, required_code, tools_note, Stage, TestTarget};
use super::{CONTEXT_SYSTEM, CONTEXT_USER};
use crate::core::StageId;
use crate::errors::StageError;
use crate::llm::{LlmClient, ToolLoop};
use crate::state::{fields, Message, SessionState, StateUpdate};
use crate::stages::render_prompt;
use crate::tools::ToolSet;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Analyzes the class, its collaborators and the edge cases worth testing.
///
/// Reads `code` and `dependency_analysis` and writes `context_analysis`.
#[derive(Debug, Clone)]
pub struct ContextStage {
    conversation: ToolLoop,
    target: TestTarget,
}

impl ContextStage {
    /// Creates the stage over a model client, without tools.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            conversation: ToolLoop::new(client),
            target: TestTarget::default(),
        }
    }

    /// Offers tools to the model.
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<ToolSet>) -> Self {
        self.conversation = self.conversation.with_tools(tools);
        self
    }

    /// Sets the test target.
    #[must_use]
    pub fn with_target(mut self, target: TestTarget) -> Self {
        self.target = target;
        self
    }

    /// Caps the number of tool rounds.
    #[must_use]
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.conversation = self.conversation.with_max_rounds(rounds);
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
impl Stage for ContextStage {
    fn id(&self) -> StageId {
        StageId::Context
    }

    async fn run(&self, state: &SessionState) -> Result<StateUpdate, StageError> {
        let code = required_code(self.id(), state)?;
        let tool_names = self
            .conversation
            .tools()
            .map(|t| t.names())
            .unwrap_or_default();

        let system = self.target.render(CONTEXT_SYSTEM) + &tools_note(&tool_names);
        let user = render_prompt(
            CONTEXT_USER,
            &[
                ("code", code),
                (
                    fields::DEPENDENCY_ANALYSIS,
                    state.get_or_default(fields::DEPENDENCY_ANALYSIS),
                ),
            ],
        );
        debug!(stage = %self.id(), prompt_chars = user.len(), "Requesting context analysis");

        let analysis = self
            .conversation
            .run(&system, &user)
            .await
            .map_err(|e| model_failure(self.id(), e))?;
        info!(stage = %self.id(), chars = analysis.len(), "Context analysis produced");

        Ok(StateUpdate::new()
            .set(fields::CONTEXT_ANALYSIS, analysis.as_str())
            .append(Message::assistant(analysis)))
    }
}
