//! Text provider trait

use crate::types::ProviderResponse;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("missing credentials for {0}")]
    MissingCredentials(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Anything that turns a prompt pair into text.
///
/// Implementations never return `Err`: failures are reported through
/// [`ProviderResponse::success`] so the gateway can treat every provider alike.
#[async_trait::async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn execute(&self, prompt: &str, system_prompt: &str) -> ProviderResponse;
}
