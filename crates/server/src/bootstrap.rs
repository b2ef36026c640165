use cordchat_common::{AppConfig, CordChatError, Result};
use cordchat_hub::HubClient;
use cordchat_llm::{LlmClient, OpenAiClient};
use cordchat_vector::{Retriever, VectorStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::chain::RagChain;

/// Load the local index, fetching it from the dataset repository first when it is missing
pub async fn prepare_index(config: &AppConfig) -> Result<VectorStore> {
    if VectorStore::exists(&config.index_dir) {
        return VectorStore::load(&config.index_dir).await;
    }

    let repo = config.hf_dataset_repo.as_deref().ok_or_else(|| {
        CordChatError::not_found(format!(
            "Vector index not found at {}: run `cordchat ingest` or set HF_DATASET_REPO",
            config.index_dir.display()
        ))
    })?;

    warn!(
        "Vector index missing at {}, downloading from dataset {}",
        config.index_dir.display(),
        repo
    );

    let hub = HubClient::new(&config.hf_endpoint, config.hf_token.clone())?;
    let files = hub
        .download_dataset_folder(repo, &config.hf_path_in_repo, &config.index_dir)
        .await?;
    info!("Downloaded {} index files", files.len());

    VectorStore::load(&config.index_dir).await
}

/// OpenAI client from the configured key
pub fn build_llm(config: &AppConfig) -> Result<Arc<dyn LlmClient>> {
    let api_key = config
        .openai_api_key
        .as_deref()
        .ok_or_else(|| CordChatError::config("OPENAI_API_KEY is not set"))?;

    let client = OpenAiClient::new(
        &config.openai_base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

/// Build the question-answering chain from configuration
pub async fn build_chain(config: &AppConfig) -> Result<RagChain> {
    let llm = build_llm(config)?;
    build_chain_with(config, llm).await
}

/// Build the chain around an existing model client
pub async fn build_chain_with(config: &AppConfig, llm: Arc<dyn LlmClient>) -> Result<RagChain> {
    let store = prepare_index(config).await?;
    let retriever = Retriever::new(store, llm.clone(), config.top_k).await;

    info!(
        "RAG chain ready - chat model: {}, top_k: {}",
        config.chat_model,
        retriever.k()
    );
    Ok(RagChain::new(
        retriever,
        llm,
        &config.chat_model,
        config.temperature,
    ))
}
