//! Completion service client trait (§4.6, §5).

use crate::error::Result;
use async_trait::async_trait;

/// Implemented by whatever generates the final natural-language response
/// from a built prompt. Treated the same as the embedding client for retry
/// purposes: reads only, soft-fail on timeout.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a response from a fully-built prompt (§4.6.3's
    /// `build_context_prompt` output).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::CompletionUnavailable`] on timeout or
    /// upstream error.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Deterministic mock used in tests: echoes back a fixed acknowledgment
/// referencing the prompt's length, so assertions can check that context
/// actually reached the client without depending on a live model's output.
pub struct MockCompletionClient;

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(format!("[mock response to {} char prompt]", prompt.len()))
    }
}
