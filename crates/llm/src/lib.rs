//! cordchat LLM Integration
//!
//! OpenAI-compatible chat-completion and embeddings client, RAG prompt and text chunking

mod chunking;
mod client;
mod llm_trait;
mod prompts;
mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use chunking::{chunk_text, split_paragraphs, TextChunk};
pub use client::{OpenAiClient, DEFAULT_EMBED_BATCH_SIZE};
pub use llm_trait::LlmClient;
pub use prompts::{format_docs, rag_prompt, RAG_TEMPLATE};
pub use types::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, EmbeddingData, EmbeddingRequest,
    EmbeddingResponse, Role, Usage,
};
