mod claude_api;
mod gemini_api;
mod openai;

pub use claude_api::ClaudeApiProvider;
pub use gemini_api::GeminiApiProvider;
pub use openai::OpenAiProvider;

use crate::Result;

/// A concrete LLM backend.
///
/// Providers report every failure as `Err`; the gateway turns those into
/// "unavailable" and moves on to the next provider.
#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    /// Stable name used in config and logs
    fn name(&self) -> &str;

    /// Send a single-turn prompt and return the text reply
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}
