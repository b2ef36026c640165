use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest question accepted by the chat endpoint (characters)
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Who wrote a chat transcript message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Passage shown under an answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceInfo {
    /// Paper title ("Unknown Title" when missing)
    pub title: String,

    /// Publication date ("Unknown Date" when missing)
    pub publish_time: String,

    /// First 200 characters of the passage
    pub preview: String,

    /// Similarity to the question
    pub score: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Markdown rendering: `**title** (date)\npreview`
    pub text: String,
}

/// Chat transcript message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: MessageRole,

    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceInfo>>,

    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            sources: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Option<Vec<SourceInfo>>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            sources,
            timestamp: Utc::now(),
        }
    }
}

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatInput {
    pub message: String,
}

/// Chat response
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatOutput {
    pub answer: String,

    pub sources: Vec<SourceInfo>,

    /// True when `answer` is an error notice instead of a generated answer
    pub error: bool,
}

/// Transcript of the caller's session
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<StoredMessage>,
}

/// Vector index summary
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexStatus {
    pub documents: usize,
    pub embedding_model: String,
    pub dimension: usize,
}

/// Configuration and readiness report for the sidebar
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub api_key_loaded: bool,
    pub chain_ready: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexStatus>,

    pub chat_model: String,
    pub top_k: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_repo: Option<String>,

    pub active_sessions: usize,
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
