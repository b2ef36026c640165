//! Corpus ingestion: papers (JSONL) -> chunked passages -> embedded index

use chrono::NaiveDate;
use cordchat_common::{CordChatError, Result};
use cordchat_llm::{chunk_text, split_paragraphs, LlmClient};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::types::{Document, DocumentMetadata, IndexEntry, VectorIndex};

/// One paper record (one JSON object per line, CORD-19 metadata field names)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paper {
    #[serde(default)]
    pub cord_uid: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,

    #[serde(default)]
    pub publish_time: Option<String>,

    #[serde(default)]
    pub authors: Option<String>,

    #[serde(default)]
    pub journal: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

impl Paper {
    fn abstract_body(&self) -> Option<&str> {
        self.abstract_text
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// Key used to drop duplicate records of the same paper
    fn dedup_key(&self) -> Option<String> {
        non_empty(&self.cord_uid)
            .map(|uid| format!("uid:{}", uid))
            .or_else(|| non_empty(&self.title).map(|t| format!("title:{}", t.to_lowercase())))
    }

    fn publish_date(&self) -> Option<NaiveDate> {
        self.publish_time.as_deref().and_then(parse_publish_time)
    }

    fn metadata(&self, chunk_index: usize) -> DocumentMetadata {
        DocumentMetadata {
            title: non_empty(&self.title).map(str::to_string),
            publish_time: non_empty(&self.publish_time).map(str::to_string),
            cord_uid: non_empty(&self.cord_uid).map(str::to_string),
            authors: non_empty(&self.authors).map(str::to_string),
            journal: non_empty(&self.journal).map(str::to_string),
            url: non_empty(&self.url).map(str::to_string),
            chunk_index,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse "YYYY-MM-DD" or a bare "YYYY" (treated as January 1st)
fn parse_publish_time(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().or_else(|| {
        value
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
    })
}

/// Read a JSONL paper file; blank lines are skipped
pub async fn read_papers_jsonl(path: &Path) -> Result<Vec<Paper>> {
    if !path.exists() {
        return Err(CordChatError::not_found(format!(
            "Corpus file not found: {}",
            path.display()
        )));
    }

    let data = tokio::fs::read_to_string(path).await?;
    let mut papers = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let paper: Paper = serde_json::from_str(line).map_err(|e| {
            CordChatError::invalid_input(format!(
                "{}:{}: invalid paper record: {}",
                path.display(),
                line_no + 1,
                e
            ))
        })?;
        papers.push(paper);
    }

    info!("Read {} paper records from {}", papers.len(), path.display());
    Ok(papers)
}

/// Keep the `limit` most recent distinct papers that have an abstract
pub fn select_recent(papers: Vec<Paper>, limit: usize) -> Vec<Paper> {
    let mut with_abstract: Vec<Paper> = papers
        .into_iter()
        .filter(|p| p.abstract_body().is_some())
        .collect();

    // Newest first; undated papers last. Stable, so the first of same-day duplicates wins
    with_abstract.sort_by(|a, b| b.publish_date().cmp(&a.publish_date()));

    let mut seen = HashSet::new();
    with_abstract
        .into_iter()
        .filter(|p| match p.dedup_key() {
            Some(key) => seen.insert(key),
            None => true,
        })
        .take(limit)
        .collect()
}

/// Ingestion parameters
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Number of papers kept
    pub limit: usize,

    /// Maximum passage size in approximate tokens
    pub chunk_tokens: usize,

    /// Overlap between consecutive passages in approximate tokens
    pub overlap_tokens: usize,

    /// Passages embedded per progress step
    pub batch_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            limit: 2000,
            chunk_tokens: 500,
            overlap_tokens: 50,
            batch_size: 100,
        }
    }
}

/// Ingestion summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub papers_read: usize,
    pub papers_selected: usize,
    pub passages: usize,
    pub embedding_dim: usize,
}

/// Builds a vector index from paper records
pub struct Ingestor {
    llm: Arc<dyn LlmClient>,
    embedding_model: String,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(llm: Arc<dyn LlmClient>, embedding_model: impl Into<String>, options: IngestOptions) -> Self {
        Self {
            llm,
            embedding_model: embedding_model.into(),
            options,
        }
    }

    /// Split selected papers into passages
    pub fn passages(&self, papers: &[Paper]) -> Vec<Document> {
        let mut documents = Vec::new();

        for paper in papers {
            let Some(body) = paper.abstract_body() else {
                continue;
            };
            let body = split_paragraphs(body).join("\n\n");

            for (chunk_index, chunk) in chunk_text(&body, self.options.chunk_tokens, self.options.overlap_tokens)
                .into_iter()
                .enumerate()
            {
                let text = chunk.text.trim();
                if text.is_empty() {
                    continue;
                }
                let metadata = paper.metadata(chunk_index);
                documents.push(Document {
                    id: passage_id(&metadata, text),
                    page_content: text.to_string(),
                    metadata,
                });
            }
        }

        documents
    }

    /// Select, chunk and embed papers into a new index
    pub async fn build(&self, papers: Vec<Paper>) -> Result<(VectorIndex, IngestReport)> {
        let papers_read = papers.len();
        let selected = select_recent(papers, self.options.limit);
        if selected.is_empty() {
            return Err(CordChatError::invalid_input("No papers with an abstract to ingest"));
        }
        if selected.len() < self.options.limit {
            warn!(
                "Only {} papers with abstracts available (limit {})",
                selected.len(),
                self.options.limit
            );
        }

        let documents = self.passages(&selected);
        info!(
            "Embedding {} passages from {} papers with {}",
            documents.len(),
            selected.len(),
            self.embedding_model
        );

        let mut index = VectorIndex::new(&self.embedding_model);
        let batch_size = self.options.batch_size.max(1);
        let total_batches = documents.len().div_ceil(batch_size);

        for (i, batch) in documents.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|d| d.page_content.clone()).collect();
            let embeddings = self.llm.embed(&self.embedding_model, &texts).await?;
            if embeddings.len() != batch.len() {
                return Err(CordChatError::llm(format!(
                    "Embedding count mismatch: sent {}, received {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            for (document, embedding) in batch.iter().cloned().zip(embeddings) {
                index
                    .add_entry(IndexEntry { document, embedding })
                    .map_err(CordChatError::vector_store)?;
            }
            debug!("Embedded batch {}/{}", i + 1, total_batches);
        }

        let report = IngestReport {
            papers_read,
            papers_selected: selected.len(),
            passages: index.count(),
            embedding_dim: index.embedding_dim,
        };
        info!("Ingestion finished: {:?}", report);

        Ok((index, report))
    }
}

/// Stable ID derived from paper identity, position and text
fn passage_id(metadata: &DocumentMetadata, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(metadata.cord_uid.as_deref().unwrap_or_default());
    hasher.update([0u8]);
    hasher.update(metadata.title.as_deref().unwrap_or_default());
    hasher.update([0u8]);
    hasher.update(metadata.chunk_index.to_le_bytes());
    hasher.update(text);
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordchat_llm::mock::MockLlm;

    fn paper(uid: &str, title: &str, date: &str, abstract_text: &str) -> Paper {
        Paper {
            cord_uid: Some(uid.to_string()),
            title: Some(title.to_string()),
            abstract_text: Some(abstract_text.to_string()),
            publish_time: Some(date.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_publish_time() {
        assert_eq!(parse_publish_time("2021-03-04"), NaiveDate::from_ymd_opt(2021, 3, 4));
        assert_eq!(parse_publish_time("2020"), NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(parse_publish_time("spring"), None);
    }

    #[test]
    fn test_select_recent_filters_dedups_and_sorts() {
        let papers = vec![
            paper("a", "Old", "2019-12-30", "abstract a"),
            paper("b", "New", "2022-01-10", "abstract b"),
            paper("b", "New duplicate", "2022-01-10", "abstract b again"),
            paper("c", "No abstract", "2023-01-01", "   "),
            paper("d", "Mid", "2021", "abstract d"),
            Paper {
                title: Some("Undated".to_string()),
                abstract_text: Some("abstract e".to_string()),
                ..Default::default()
            },
        ];

        let selected = select_recent(papers, 10);
        let titles: Vec<_> = selected.iter().map(|p| p.title.clone().unwrap()).collect();
        assert_eq!(titles, vec!["New", "Mid", "Old", "Undated"]);

        let limited = select_recent(
            vec![paper("a", "A", "2020-01-01", "x"), paper("b", "B", "2021-01-01", "y")],
            1,
        );
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].title.as_deref(), Some("B"));
    }

    #[test]
    fn test_select_recent_keeps_newest_duplicate() {
        let papers = vec![
            paper("a", "Preprint", "2020-04-01", "early version"),
            paper("b", "Other", "2020-06-01", "abstract b"),
            paper("a", "Published", "2021-02-01", "final version"),
        ];

        let selected = select_recent(papers, 10);
        let titles: Vec<_> = selected.iter().map(|p| p.title.clone().unwrap()).collect();
        assert_eq!(titles, vec!["Published", "Other"]);
        assert_eq!(selected[0].abstract_text.as_deref(), Some("final version"));

        // The limit applies after duplicates are dropped
        let papers = vec![
            paper("a", "A old", "2020-01-01", "x"),
            paper("a", "A new", "2022-01-01", "x2"),
            paper("b", "B", "2021-01-01", "y"),
        ];
        let selected = select_recent(papers, 2);
        let titles: Vec<_> = selected.iter().map(|p| p.title.clone().unwrap()).collect();
        assert_eq!(titles, vec!["A new", "B"]);
    }

    #[test]
    fn test_passages_chunk_long_abstracts() {
        let llm = Arc::new(MockLlm::new());
        let ingestor = Ingestor::new(
            llm,
            "mock-embed",
            IngestOptions {
                chunk_tokens: 10,
                overlap_tokens: 2,
                ..Default::default()
            },
        );

        let long = "Patients reported fatigue. Many had dyspnea. Some lost smell. Others had headache.";
        let docs = ingestor.passages(&[paper("a", "Symptoms", "2021-01-01", long)]);
        assert!(docs.len() > 1);
        assert_eq!(docs[0].metadata.chunk_index, 0);
        assert_eq!(docs[1].metadata.chunk_index, 1);
        assert_eq!(docs[0].metadata.title.as_deref(), Some("Symptoms"));
        assert_ne!(docs[0].id, docs[1].id);
    }

    #[test]
    fn test_passage_id_is_stable() {
        let meta = DocumentMetadata {
            cord_uid: Some("ug7v899j".to_string()),
            ..Default::default()
        };
        assert_eq!(passage_id(&meta, "text"), passage_id(&meta, "text"));
        assert_ne!(passage_id(&meta, "text"), passage_id(&meta, "other"));
        assert_eq!(passage_id(&meta, "text").len(), 16);
    }

    #[tokio::test]
    async fn test_build_index() {
        let llm = Arc::new(MockLlm::new());
        let ingestor = Ingestor::new(
            llm.clone(),
            "mock-embed",
            IngestOptions {
                batch_size: 1,
                ..Default::default()
            },
        );

        let papers = vec![
            paper("a", "Smell", "2021-01-01", "Anosmia is frequent."),
            paper("b", "Vaccines", "2022-01-01", "mRNA vaccines reduce hospitalisation."),
            paper("c", "Empty", "2022-01-01", ""),
        ];

        let (index, report) = ingestor.build(papers).await.unwrap();
        assert_eq!(report.papers_read, 3);
        assert_eq!(report.papers_selected, 2);
        assert_eq!(report.passages, 2);
        assert_eq!(report.embedding_dim, cordchat_llm::mock::MOCK_DIM);
        assert_eq!(index.embedding_model, "mock-embed");
        assert_eq!(llm.embed_calls(), 2);
    }

    #[tokio::test]
    async fn test_build_rejects_empty_corpus() {
        let ingestor = Ingestor::new(Arc::new(MockLlm::new()), "m", IngestOptions::default());
        let result = ingestor.build(vec![paper("a", "t", "2020", "")]).await;
        assert!(matches!(result, Err(CordChatError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_read_papers_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.jsonl");
        std::fs::write(
            &path,
            "{\"cord_uid\": \"a\", \"title\": \"T\", \"abstract\": \"A\", \"publish_time\": \"2020-05-01\"}\n\n{\"title\": \"U\"}\n",
        )
        .unwrap();

        let papers = read_papers_jsonl(&path).await.unwrap();
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].abstract_text.as_deref(), Some("A"));

        std::fs::write(&path, "{\"title\": \"ok\"}\nnot json\n").unwrap();
        let err = read_papers_jsonl(&path).await.unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }
}
