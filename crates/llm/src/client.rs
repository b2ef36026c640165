use async_trait::async_trait;
use cordchat_common::{CordChatError, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::llm_trait::LlmClient;
use crate::types::{ApiErrorBody, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse};

/// Inputs sent per embeddings call by [`OpenAiClient::embed_batched`]
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 100;

const MAX_RETRIES: u32 = 3;

/// Wait before the first retry; doubled for each further attempt
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Failure of a single attempt, tagged with whether retrying can help
struct AttemptError {
    error: CordChatError,
    retryable: bool,
}

impl AttemptError {
    fn retryable(error: CordChatError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn fatal(error: CordChatError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

/// OpenAI-compatible API client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: Client,
    retry_base_delay: Duration,
}

impl OpenAiClient {
    /// Create new client
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CordChatError::config("OpenAI API key is empty"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        info!("OpenAI client initialized: {}", base_url);
        Ok(Self {
            base_url,
            api_key,
            client,
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    /// Override the backoff base (1s by default)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate a chat completion (with retry logic)
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            "Sending chat request - Model: {}, Messages: {}, Prompt length: {}",
            request.model,
            request.messages.len(),
            request.messages.iter().map(|m| m.content.len()).sum::<usize>()
        );

        let response: ChatResponse = self.post_with_retry(&url, request, "chat").await?;

        if let Some(usage) = response.usage {
            debug!(
                "Chat usage - prompt: {}, completion: {}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        match response.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
            _ => Err(CordChatError::llm("Empty response from chat completion API")),
        }
    }

    /// Embed a batch of inputs in a single call (with retry logic)
    pub async fn embeddings(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: model.to_string(),
            input: inputs.to_vec(),
        };

        debug!("Generating embeddings - Model: {}, Inputs: {}", model, inputs.len());

        let response: EmbeddingResponse = self.post_with_retry(&url, &request, "embedding").await?;
        let embeddings = response.into_ordered();

        if embeddings.len() != inputs.len() {
            return Err(CordChatError::llm(format!(
                "Embedding count mismatch: sent {}, received {}",
                inputs.len(),
                embeddings.len()
            )));
        }
        if embeddings.iter().any(|e| e.is_empty()) {
            return Err(CordChatError::llm("Empty embedding from API"));
        }

        debug!(
            "Received embeddings - Dimension: {}",
            embeddings.first().map(|e| e.len()).unwrap_or(0)
        );
        Ok(embeddings)
    }

    /// Embed any number of inputs, `batch_size` per request
    pub async fn embed_batched(
        &self,
        model: &str,
        inputs: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let batch_size = batch_size.max(1);
        let total_batches = inputs.len().div_ceil(batch_size);
        let mut all = Vec::with_capacity(inputs.len());

        for (i, batch) in inputs.chunks(batch_size).enumerate() {
            debug!("Embedding batch {}/{}", i + 1, total_batches);
            all.extend(self.embeddings(model, batch).await?);
        }

        Ok(all)
    }

    /// POST a JSON body, retrying transient failures with exponential backoff
    async fn post_with_retry<B, T>(&self, url: &str, body: &B, what: &str) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.try_post(url, body).await {
                Ok(value) => return Ok(value),
                Err(AttemptError {
                    error,
                    retryable: false,
                }) => return Err(error),
                Err(AttemptError { error, .. }) => {
                    if attempt < MAX_RETRIES {
                        let delay = self.retry_base_delay * 2u32.pow(attempt - 1);
                        warn!(
                            "{} request failed (attempt {}/{}): {}. Retrying in {:?}...",
                            what, attempt, MAX_RETRIES, error, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CordChatError::llm("All retries failed")))
    }

    /// Single attempt
    async fn try_post<B, T>(&self, url: &str, body: &B) -> std::result::Result<T, AttemptError>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AttemptError::retryable(CordChatError::network(format!(
                    "Failed to send request: {}",
                    e
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = api_error(status, &text);
            return Err(if is_retryable_status(status) {
                AttemptError::retryable(error)
            } else {
                AttemptError::fatal(error)
            });
        }

        response.json::<T>().await.map_err(|e| {
            AttemptError::fatal(CordChatError::llm(format!("Failed to parse response: {}", e)))
        })
    }
}

/// Rate limits and server-side failures are worth retrying
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Map an error response to a typed error, using the API's message when present
fn api_error(status: StatusCode, body: &str) -> CordChatError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| match b.error.kind {
            Some(kind) => format!("{} ({})", b.error.message, kind),
            None => b.error.message,
        })
        .unwrap_or_else(|_| body.chars().take(300).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CordChatError::unauthorized(format!("API rejected credentials: {}", message))
        }
        _ => CordChatError::llm(format!("API error {}: {}", status, message)),
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, request: ChatRequest) -> Result<String> {
        self.chat_completion(&request).await
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_batched(model, inputs, DEFAULT_EMBED_BATCH_SIZE).await
    }

    async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| CordChatError::network(format!("Failed to connect to API: {}", e)))?;
        Ok(response.status().is_success())
    }
}
