use cordchat_common::{CordChatError, Result};
use cordchat_llm::LlmClient;
use std::sync::Arc;
use tracing::debug;

use crate::engine::VectorStore;
use crate::types::ScoredDocument;

/// Embeds questions and returns the `k` most similar passages
#[derive(Clone)]
pub struct Retriever {
    store: VectorStore,
    llm: Arc<dyn LlmClient>,
    embedding_model: String,
    k: usize,
}

impl Retriever {
    /// Create a retriever; queries are embedded with the model the index was built with
    pub async fn new(store: VectorStore, llm: Arc<dyn LlmClient>, k: usize) -> Self {
        let embedding_model = store.embedding_model().await;
        Self {
            store,
            llm,
            embedding_model,
            k: k.max(1),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Retrieve the passages most relevant to `query`
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredDocument>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CordChatError::invalid_input("Query cannot be empty"));
        }

        let embedding = self
            .llm
            .embed(&self.embedding_model, &[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| CordChatError::llm("No embedding returned for query"))?;

        let results = self.store.search(&embedding, self.k).await?;
        debug!(
            "Retrieved {} passages (top score: {:?})",
            results.len(),
            results.first().map(|r| r.score)
        );
        Ok(results)
    }
}
