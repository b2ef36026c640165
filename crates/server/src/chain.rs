use cordchat_common::Result;
use cordchat_llm::{format_docs, rag_prompt, ChatRequest, LlmClient};
use cordchat_vector::{Retriever, ScoredDocument};
use std::sync::Arc;
use tracing::{debug, info};

use crate::types::SourceInfo;

/// Characters of passage text shown in a source preview
pub const PREVIEW_CHARS: usize = 200;

/// Generated answer with the passages it was grounded on
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SourceInfo>,
}

/// Retrieve -> prompt -> chat completion
pub struct RagChain {
    retriever: Retriever,
    llm: Arc<dyn LlmClient>,
    chat_model: String,
    temperature: f32,
}

impl RagChain {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn LlmClient>,
        chat_model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            retriever,
            llm,
            chat_model: chat_model.into(),
            temperature,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer a question from the retrieved passages
    ///
    /// Retrieval runs once; the same passages feed the prompt and the returned sources.
    pub async fn invoke(&self, question: &str) -> Result<RagAnswer> {
        let question = question.trim();
        let documents = self.retriever.retrieve(question).await?;

        let passages: Vec<&str> = documents
            .iter()
            .map(|d| d.document.page_content.as_str())
            .collect();
        let prompt = rag_prompt(&format_docs(&passages), question);
        debug!("Prompt built - {} passages, {} chars", passages.len(), prompt.len());

        let request = ChatRequest::single_turn(&self.chat_model, prompt, self.temperature);
        let answer = self.llm.chat(request).await?;

        info!("Answered question with {} sources", documents.len());
        Ok(RagAnswer {
            answer: answer.trim().to_string(),
            sources: documents.iter().map(source_info).collect(),
        })
    }
}

/// Display form of a retrieved passage
pub fn source_info(doc: &ScoredDocument) -> SourceInfo {
    let meta = &doc.document.metadata;
    let title = meta
        .title
        .clone()
        .unwrap_or_else(|| "Unknown Title".to_string());
    let publish_time = meta
        .publish_time
        .clone()
        .unwrap_or_else(|| "Unknown Date".to_string());
    let preview = preview(&doc.document.page_content, PREVIEW_CHARS);
    let text = format!("**{}** ({})\n{}", title, publish_time, preview);

    SourceInfo {
        title,
        publish_time,
        preview,
        score: doc.score,
        url: meta.url.clone(),
        text,
    }
}

/// First `max_chars` characters, with "..." appended when text was cut
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordchat_llm::mock::MockLlm;
    use cordchat_vector::{Document, DocumentMetadata, IndexEntry, VectorIndex, VectorStore};

    fn scored(title: Option<&str>, date: Option<&str>, text: &str) -> ScoredDocument {
        ScoredDocument {
            document: Document {
                id: "id".to_string(),
                page_content: text.to_string(),
                metadata: DocumentMetadata {
                    title: title.map(str::to_string),
                    publish_time: date.map(str::to_string),
                    ..Default::default()
                },
            },
            score: 0.9,
        }
    }

    #[test]
    fn test_source_info_format() {
        let info = source_info(&scored(Some("Anosmia in COVID-19"), Some("2021-02-01"), "Smell loss."));
        assert_eq!(info.text, "**Anosmia in COVID-19** (2021-02-01)\nSmell loss.");
        assert_eq!(info.preview, "Smell loss.");
    }

    #[test]
    fn test_source_info_defaults() {
        let info = source_info(&scored(None, None, "x"));
        assert_eq!(info.title, "Unknown Title");
        assert_eq!(info.publish_time, "Unknown Date");
    }

    #[test]
    fn test_preview_truncates_by_characters() {
        let long = "é".repeat(250);
        let p = preview(&long, PREVIEW_CHARS);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));

        let exact = "a".repeat(200);
        assert_eq!(preview(&exact, PREVIEW_CHARS), exact);
    }

    async fn chain(llm: Arc<MockLlm>, dir: &std::path::Path) -> RagChain {
        let mut index = VectorIndex::new("mock-embed");
        for (id, title, text) in [
            ("1", "Olfactory dysfunction", "anosmia loss of smell is a frequent neurological symptom"),
            ("2", "Vaccine trial", "mRNA vaccine efficacy against symptomatic infection"),
        ] {
            index
                .add_entry(IndexEntry {
                    document: Document {
                        id: id.to_string(),
                        page_content: text.to_string(),
                        metadata: DocumentMetadata {
                            title: Some(title.to_string()),
                            ..Default::default()
                        },
                    },
                    embedding: MockLlm::embed_text(text),
                })
                .unwrap();
        }
        let store = VectorStore::new(index, dir);
        let retriever = Retriever::new(store, llm.clone(), 1).await;
        RagChain::new(retriever, llm, "gpt-3.5-turbo", 0.0)
    }

    #[tokio::test]
    async fn test_invoke_grounds_prompt_in_retrieved_passages() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::with_answer("  Loss of smell.  "));
        let chain = chain(llm.clone(), dir.path()).await;

        let result = chain.invoke("What about loss of smell?").await.unwrap();
        assert_eq!(result.answer, "Loss of smell.");
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].title, "Olfactory dysfunction");

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("anosmia loss of smell"));
        assert!(prompts[0].contains("Question: What about loss of smell?"));
        assert!(!prompts[0].contains("mRNA vaccine"));
        // Query embedded once
        assert_eq!(llm.embed_calls(), 1);
    }

    #[tokio::test]
    async fn test_invoke_propagates_llm_failure() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::new());
        llm.set_fail_chat(true);
        let chain = chain(llm, dir.path()).await;
        assert!(chain.invoke("smell").await.is_err());
    }
}
