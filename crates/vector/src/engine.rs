use cordchat_common::config::INDEX_FILE_NAME;
use cordchat_common::{CordChatError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::similarity::cosine_similarity;
use crate::types::{IndexEntry, ScoredDocument, VectorIndex};

/// File-backed vector store
///
/// The whole index lives in memory; `<index_dir>/index.json` is its persisted form.
#[derive(Clone)]
pub struct VectorStore {
    index: Arc<RwLock<VectorIndex>>,
    index_dir: PathBuf,
}

impl VectorStore {
    /// Wrap an in-memory index that will be saved under `index_dir`
    pub fn new(index: VectorIndex, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index: Arc::new(RwLock::new(index)),
            index_dir: index_dir.into(),
        }
    }

    /// Load an existing index from disk
    pub async fn load(index_dir: impl Into<PathBuf>) -> Result<Self> {
        let index_dir = index_dir.into();
        let index_path = index_dir.join(INDEX_FILE_NAME);

        if !index_path.exists() {
            return Err(CordChatError::not_found(format!(
                "Vector index not found: {}",
                index_path.display()
            )));
        }

        let data = tokio::fs::read_to_string(&index_path).await?;
        let index: VectorIndex = serde_json::from_str(&data).map_err(|e| {
            CordChatError::vector_store(format!(
                "Failed to parse vector index {}: {}",
                index_path.display(),
                e
            ))
        })?;

        info!(
            "Vector store loaded - {} entries, model: {}, dim: {}",
            index.count(),
            index.embedding_model,
            index.embedding_dim
        );

        Ok(Self::new(index, index_dir))
    }

    /// Whether a persisted index exists in `index_dir`
    pub fn exists(index_dir: &Path) -> bool {
        index_dir.join(INDEX_FILE_NAME).is_file()
    }

    /// Directory holding the persisted index
    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Add entries to the in-memory index
    pub async fn add_entries(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut index = self.index.write().await;
        for entry in entries {
            index.add_entry(entry).map_err(CordChatError::vector_store)?;
        }
        Ok(())
    }

    /// Find the `top_k` entries most similar to `query_embedding`
    pub async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<ScoredDocument>> {
        let index = self.index.read().await;

        if index.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        if query_embedding.len() != index.embedding_dim {
            return Err(CordChatError::vector_store(format!(
                "Query embedding dimension {} does not match index dimension {}",
                query_embedding.len(),
                index.embedding_dim
            )));
        }

        let mut results: Vec<ScoredDocument> = index
            .entries
            .iter()
            .map(|entry| ScoredDocument {
                document: entry.document.clone(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();

        // Sort by score (descending)
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);

        debug!(
            "Search completed - {} results from {} candidates",
            results.len(),
            index.count()
        );
        Ok(results)
    }

    /// Save index to `<index_dir>/index.json` (write to temp, then rename)
    pub async fn save(&self) -> Result<PathBuf> {
        let index = self.index.read().await;

        tokio::fs::create_dir_all(&self.index_dir).await?;
        let index_path = self.index_dir.join(INDEX_FILE_NAME);
        let temp_path = index_path.with_extension("json.tmp");

        let data = serde_json::to_vec(&*index)?;
        tokio::fs::write(&temp_path, data).await?;
        tokio::fs::rename(&temp_path, &index_path).await?;

        info!(
            "Vector index saved - {} entries to {}",
            index.count(),
            index_path.display()
        );
        Ok(index_path)
    }

    /// Get index statistics: (entry count, embedding model, dimension)
    pub async fn stats(&self) -> (usize, String, usize) {
        let index = self.index.read().await;
        (index.count(), index.embedding_model.clone(), index.embedding_dim)
    }

    /// Embedding model the index was built with
    pub async fn embedding_model(&self) -> String {
        self.index.read().await.embedding_model.clone()
    }
}
