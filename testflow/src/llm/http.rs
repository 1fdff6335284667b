//! OpenAI-compatible chat-completions client.

use super::{ChatMessage, LlmClient, LlmRequest, LlmResponse, ToolCall};
use crate::config::LlmConfig;
use crate::errors::LlmError;
use crate::state::Role;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint,
/// including function tools.
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the underlying client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = format!("Bearer {key}");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| LlmError::Http(e.to_string()))?,
            );
        }
        Ok(headers)
    }
}

impl std::fmt::Debug for HttpLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLlmClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = wire_request(&self.config, &request);
        debug!(
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Response(format!("HTTP {status}: {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        parse_response(&text)
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

fn wire_request(config: &LlmConfig, request: &LlmRequest) -> WireRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(WireMessage {
        role: Role::System.as_str(),
        content: Some(request.system.clone()),
        tool_calls: Vec::new(),
        tool_call_id: None,
    });
    messages.extend(request.messages.iter().map(wire_message));

    WireRequest {
        model: config.model.clone(),
        messages,
        temperature: request.temperature.unwrap_or(config.temperature),
        tools: request.tools.iter().map(|t| t.to_openai()).collect(),
    }
}

fn wire_message(message: &ChatMessage) -> WireMessage {
    WireMessage {
        role: message.role.as_str(),
        content: message.content.clone(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: call.id.clone(),
                kind: function_type(),
                function: WireFunction {
                    name: Some(call.name.clone()),
                    arguments: match &call.arguments {
                        Value::String(raw) => raw.clone(),
                        other => other.to_string(),
                    },
                },
            })
            .collect(),
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn parse_response(text: &str) -> Result<LlmResponse, LlmError> {
    let parsed: WireResponse =
        serde_json::from_str(text).map_err(|e| LlmError::Serialization(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Response("Missing choices".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            let name = call.function.name.ok_or_else(|| {
                LlmError::Response(format!("tool call '{}' has no function name", call.id))
            })?;
            let raw = call.function.arguments;
            let arguments = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            Ok(ToolCall::new(call.id, name, arguments))
        })
        .collect::<Result<Vec<_>, LlmError>>()?;

    Ok(LlmResponse {
        content: choice.message.content,
        tool_calls,
        model: parsed.model,
        input_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
        output_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
        finish_reason: choice.finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolDefinition;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let config = LlmConfig::default().with_model("test-model");
        let mut request = LlmRequest::new("be brief", "hello")
            .with_tools(vec![ToolDefinition::new("lookup").with_string_param("q", "query")]);
        request.messages.push(ChatMessage::assistant(
            None,
            vec![ToolCall::new("c1", "lookup", json!({"q": "x"}))],
        ));
        request.messages.push(ChatMessage::tool_result("c1", "{\"hit\":true}"));

        let body = serde_json::to_value(wire_request(&config, &request)).unwrap();

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "be brief"}));
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hello"}));
        assert_eq!(
            body["messages"][2],
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "c1",
                    "type": "function",
                    "function": {"name": "lookup", "arguments": "{\"q\":\"x\"}"}
                }]
            })
        );
        assert_eq!(body["messages"][3]["tool_call_id"], "c1");
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");
    }

    #[test]
    fn test_request_without_tools_omits_field() {
        let body =
            serde_json::to_value(wire_request(&LlmConfig::default(), &LlmRequest::new("s", "u")))
                .unwrap();
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_text_response() {
        let text = r#"{
            "model": "m",
            "choices": [{"message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }"#;
        let response = parse_response(text).unwrap();
        assert_eq!(response.content.as_deref(), Some("hi"));
        assert_eq!(response.input_tokens, Some(12));
        assert_eq!(response.output_tokens, Some(3));
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert!(!response.wants_tools());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let text = r#"{
            "choices": [{"message": {"content": null, "tool_calls": [
                {"id": "a", "type": "function", "function": {"name": "f", "arguments": "{\"x\": 1}"}},
                {"id": "b", "type": "function", "function": {"name": "g", "arguments": "{broken"}}
            ]}}]
        }"#;
        let response = parse_response(text).unwrap();
        assert_eq!(
            response.tool_calls,
            vec![
                ToolCall::new("a", "f", json!({"x": 1})),
                ToolCall::new("b", "g", json!("{broken")),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_responses() {
        assert!(matches!(
            parse_response(r#"{"choices": []}"#),
            Err(LlmError::Response(_))
        ));
        assert!(matches!(parse_response("not json"), Err(LlmError::Serialization(_))));
        let nameless = r#"{"choices": [{"message": {"tool_calls": [
            {"id": "a", "function": {"arguments": "{}"}}
        ]}}]}"#;
        assert!(matches!(parse_response(nameless), Err(LlmError::Response(_))));
    }
}
