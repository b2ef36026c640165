//! cordchat Vector Store
//!
//! File-backed embedding index, cosine similarity search, retriever and corpus ingestion

mod engine;
mod ingest;
mod retriever;
mod similarity;
mod types;

pub use engine::VectorStore;
pub use ingest::{read_papers_jsonl, select_recent, IngestOptions, IngestReport, Ingestor, Paper};
pub use retriever::Retriever;
pub use similarity::cosine_similarity;
pub use types::{Document, DocumentMetadata, IndexEntry, ScoredDocument, VectorIndex};
