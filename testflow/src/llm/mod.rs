//! Model capability used by the analysis stages.
//!
//! [`LlmClient`] is the seam; [`HttpLlmClient`] talks to an OpenAI-compatible
//! endpoint and [`ToolLoop`] runs a tool-calling conversation on top of any
//! client.

mod client;
#[cfg(feature = "http")]
mod http;
mod tool_loop;
mod types;

#[cfg(test)]
pub use client::MockLlmClient;
pub use client::LlmClient;
#[cfg(feature = "http")]
pub use http::HttpLlmClient;
pub use tool_loop::{ToolLoop, DEFAULT_MAX_TOOL_ROUNDS};
pub use types::{ChatMessage, LlmRequest, LlmResponse, ToolCall};
