//! A scripted model client.

use crate::errors::LlmError;
use crate::llm::{LlmClient, LlmRequest, LlmResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A model client that replays queued responses and records every request.
///
/// Once the script runs out, calls fail with [`LlmError::Response`].
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlmClient {
    /// Creates a client with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client answering each call with the next text.
    #[must_use]
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for text in texts {
            client.push_text(text);
        }
        client
    }

    /// Queues a response.
    pub fn push(&self, response: Result<LlmResponse, LlmError>) {
        self.script.lock().push_back(response);
    }

    /// Queues a text response.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(Ok(LlmResponse::text(text)));
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of queued responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Response("script exhausted".to_string())))
    }
}
