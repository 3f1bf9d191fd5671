//! LLM Client Module
//!
//! One trait for anything that turns a prompt into a completion. The chat
//! service only sees `LlmClient`; production wires `OpenAiCompatClient`
//! (Groq, OpenRouter, vLLM and friends all speak this dialect).

use async_trait::async_trait;

mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

/// LLM call errors
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM API returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("LLM API returned no choices")]
    EmptyResponse,
    #[error("API key environment variable '{0}' is not set")]
    MissingApiKey(String),
}

/// Unified trait for completion backends
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete `prompt` with `model`, returning the assistant text.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, LlmError>;

    /// Get the backend name for logging
    fn backend_name(&self) -> &'static str;
}
