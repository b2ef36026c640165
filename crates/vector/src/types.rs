use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paper-level metadata attached to each passage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Paper title
    #[serde(default)]
    pub title: Option<String>,

    /// Publication date as given by the corpus (e.g. "2021-03-04" or "2020")
    #[serde(default)]
    pub publish_time: Option<String>,

    /// CORD-19 paper identifier
    #[serde(default)]
    pub cord_uid: Option<String>,

    #[serde(default)]
    pub authors: Option<String>,

    #[serde(default)]
    pub journal: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    /// Position of this passage within the paper's abstract
    #[serde(default)]
    pub chunk_index: usize,
}

/// Retrievable passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable passage ID
    pub id: String,

    /// Passage text
    pub page_content: String,

    pub metadata: DocumentMetadata,
}

/// Vector index entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// Vector index structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Embedding model used
    pub embedding_model: String,

    /// Embedding dimension (0 until the first entry is added)
    pub embedding_dim: usize,

    /// Timestamp when built
    pub created_at: DateTime<Utc>,

    pub entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create new empty index
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            embedding_dim: 0,
            created_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    /// Add entry to index, fixing the dimension on first insert
    pub fn add_entry(&mut self, entry: IndexEntry) -> Result<(), String> {
        if entry.embedding.is_empty() {
            return Err(format!("Empty embedding for document {}", entry.document.id));
        }
        if self.embedding_dim == 0 {
            self.embedding_dim = entry.embedding.len();
        } else if entry.embedding.len() != self.embedding_dim {
            return Err(format!(
                "Embedding dimension mismatch for {}: expected {}, got {}",
                entry.document.id,
                self.embedding_dim,
                entry.embedding.len()
            ));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Get document by id
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.entries
            .iter()
            .map(|e| &e.document)
            .find(|d| d.id == id)
    }

    /// Count entries
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Search result
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,

    /// Cosine similarity (-1.0 to 1.0)
    pub score: f32,
}
