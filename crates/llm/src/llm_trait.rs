use async_trait::async_trait;
use cordchat_common::Result;

use crate::types::ChatRequest;

/// Common trait for chat-completion / embeddings backends
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate an answer for a chat request
    async fn chat(&self, request: ChatRequest) -> Result<String>;

    /// Embed each input text, returning vectors in input order
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Test connection/availability
    async fn test_connection(&self) -> Result<bool>;
}
