//! The model capability seam.

use super::{LlmRequest, LlmResponse};
use crate::errors::LlmError;
use async_trait::async_trait;

/// A chat-completion capability.
///
/// Implementations must not retry failed calls; a failure is reported to
/// the calling stage as-is.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends one completion request.
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;
}
