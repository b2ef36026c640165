//! Deterministic in-process [`LlmClient`] for tests

use async_trait::async_trait;
use cordchat_common::{CordChatError, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::llm_trait::LlmClient;
use crate::types::ChatRequest;

/// Dimension of mock embeddings
pub const MOCK_DIM: usize = 32;

/// Bag-of-words embedder and canned-answer chat model
#[derive(Default)]
pub struct MockLlm {
    answer: Option<String>,
    fail_chat: AtomicBool,
    embed_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer returned by every chat call
    pub fn with_answer(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            ..Self::default()
        }
    }

    /// Make subsequent chat calls fail
    pub fn set_fail_chat(&self, fail: bool) {
        self.fail_chat.store(fail, Ordering::SeqCst);
    }

    /// Number of embed calls made so far
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Prompts received by chat, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Embed a single text: lower-cased words hashed into buckets
    pub fn embed_text(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; MOCK_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let bucket = word
                .bytes()
                .fold(0usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
                % MOCK_DIM;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn chat(&self, request: ChatRequest) -> Result<String> {
        if self.fail_chat.load(Ordering::SeqCst) {
            return Err(CordChatError::llm("mock chat failure"));
        }

        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        Ok(self
            .answer
            .clone()
            .unwrap_or_else(|| format!("answer based on {} chars of prompt", prompt.len())))
    }

    async fn embed(&self, _model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().map(|t| Self::embed_text(t)).collect())
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(true)
    }
}
