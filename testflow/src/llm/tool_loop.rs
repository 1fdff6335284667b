//! The tool-calling conversation loop.

use super::{ChatMessage, LlmClient, LlmRequest, ToolCall};
use crate::errors::{LlmError, ToolError};
use crate::tools::ToolSet;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default cap on tool-call rounds per conversation.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Drives one model conversation, executing tool calls until the model
/// answers with text.
///
/// Tool failures (unknown tool, bad arguments, execution errors) are sent
/// back to the model as `{"error": ...}` results rather than failing the
/// conversation. The model call itself is never retried.
#[derive(Clone)]
pub struct ToolLoop {
    client: Arc<dyn LlmClient>,
    tools: Option<Arc<ToolSet>>,
    max_rounds: usize,
    temperature: Option<f32>,
}

impl ToolLoop {
    /// Creates a loop with no tools.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            tools: None,
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            temperature: None,
        }
    }

    /// Offers a tool set to the model.
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<ToolSet>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Sets the maximum number of tool rounds.
    #[must_use]
    pub const fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Returns the tool set, if any.
    #[must_use]
    pub fn tools(&self) -> Option<&Arc<ToolSet>> {
        self.tools.as_ref()
    }

    /// Runs the conversation and returns the model's final text.
    ///
    /// # Errors
    ///
    /// Returns the client's error unchanged, [`LlmError::Response`] when the
    /// final answer carries no content, or [`LlmError::ToolLoopExhausted`] when
    /// the model keeps calling tools past the round limit.
    pub async fn run(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let mut request = LlmRequest::new(system, user);
        request.temperature = self.temperature;
        if let Some(tools) = self.tools.as_ref().filter(|t| !t.is_empty()) {
            request.tools = tools.definitions();
        }

        let mut rounds = 0;
        loop {
            let response = self.client.complete(request.clone()).await?;
            debug!(
                round = rounds,
                tool_calls = response.tool_calls.len(),
                output_tokens = ?response.output_tokens,
                "Model responded"
            );

            if !response.wants_tools() {
                return response
                    .content
                    .ok_or_else(|| LlmError::Response("model returned no content".to_string()));
            }
            if rounds >= self.max_rounds {
                return Err(LlmError::ToolLoopExhausted { rounds });
            }
            rounds += 1;

            let calls = response.tool_calls.clone();
            request
                .messages
                .push(ChatMessage::assistant(response.content, response.tool_calls));
            for call in calls {
                let result = self.invoke(&call).await;
                request
                    .messages
                    .push(ChatMessage::tool_result(call.id, result.to_string()));
            }
        }
    }

    async fn invoke(&self, call: &ToolCall) -> Value {
        let outcome = match self.tools.clone() {
            None => Err(ToolError::NotFound(call.name.clone())),
            Some(tools) => match normalize_arguments(&call.name, &call.arguments) {
                Err(e) => Err(e),
                Ok(args) => {
                    let name = call.name.clone();
                    tokio::task::spawn_blocking(move || tools.invoke(&name, &args))
                        .await
                        .unwrap_or_else(|e| {
                            Err(ToolError::execution_failed(
                                call.name.as_str(),
                                format!("tool task failed: {e}"),
                            ))
                        })
                }
            },
        };

        outcome.unwrap_or_else(|e| {
            warn!(tool = %call.name, error = %e, "Tool call failed");
            json!({ "error": e.to_string() })
        })
    }
}

impl std::fmt::Debug for ToolLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoop")
            .field("tools", &self.tools)
            .field("max_rounds", &self.max_rounds)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

/// Turns provider arguments into an object.
///
/// A blank or null value means "no arguments"; a string is parsed as JSON.
fn normalize_arguments(tool: &str, arguments: &Value) -> Result<Value, ToolError> {
    match arguments {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::String(raw) if raw.trim().is_empty() => Ok(Value::Object(Map::new())),
        Value::String(raw) => serde_json::from_str(raw).map_err(|e| {
            ToolError::invalid_arguments(tool, format!("arguments are not valid JSON: {e}"))
        }),
        other => Ok(other.clone()),
    }
}
