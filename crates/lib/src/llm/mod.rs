//! Generative backend: the [`TextGenerator`] seam, the Ollama client, and system prompts.

mod ollama;
mod prompts;

use async_trait::async_trait;

pub use ollama::{ChatMessage, OllamaClient};
pub use prompts::SystemPrompts;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("ollama request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("ollama api error: {0}")]
    Api(String),
    #[error("ollama returned an empty response")]
    EmptyResponse,
}

/// Turns a prompt plus a system instruction into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, LlmError>;
}
