use crate::error::CordChatError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for application-specific environment variables (e.g. `CORDCHAT_TOP_K`)
pub const ENV_PREFIX: &str = "CORDCHAT";

/// File inside the index directory holding the serialized vector index
pub const INDEX_FILE_NAME: &str = "index.json";

/// cordchat application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    pub openai_base_url: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Chat-completion model name
    pub chat_model: String,

    /// Sampling temperature for answers
    pub temperature: f32,

    /// Number of passages retrieved per question
    pub top_k: usize,

    /// Local vector index directory
    pub index_dir: PathBuf,

    /// Dataset repository holding the published index (`owner/name`)
    pub hf_dataset_repo: Option<String>,

    /// Hub access token
    pub hf_token: Option<String>,

    /// Hub endpoint
    pub hf_endpoint: String,

    /// Folder inside the dataset repository holding the index files
    pub hf_path_in_repo: String,

    /// Server bind address
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Idle time after which a chat session is dropped
    pub session_ttl_secs: u64,

    /// Maximum number of concurrent chat sessions
    pub max_sessions: usize,

    /// Timeout for outbound API calls
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            top_k: 5,
            index_dir: PathBuf::from("./cord19_index"),
            hf_dataset_repo: None,
            hf_token: None,
            hf_endpoint: "https://huggingface.co".to_string(),
            hf_path_in_repo: "vectorstore".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 8501,
            log_dir: PathBuf::from("./logs"),
            log_level: "info".to_string(),
            session_ttl_secs: 3600,
            max_sessions: 1000,
            request_timeout_secs: 120,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, CordChatError> {
        Self::load(None)
    }

    /// Load configuration: defaults, then an optional TOML file, then
    /// `CORDCHAT_*` variables, then the vendor variables (`OPENAI_API_KEY`, `HF_TOKEN`, ...)
    pub fn load(config_file: Option<&Path>) -> Result<Self, CordChatError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(CordChatError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let mut config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        config.apply_vendor_env();
        config.ensure_directories()?;

        Ok(config)
    }

    /// Apply the unprefixed variables used by the OpenAI and Hugging Face tooling
    fn apply_vendor_env(&mut self) {
        if let Some(key) = Self::get_env("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = Self::get_env("OPENAI_BASE_URL") {
            self.openai_base_url = url;
        }
        if let Some(token) =
            Self::get_env("HF_TOKEN").or_else(|| Self::get_env("HUGGING_FACE_HUB_TOKEN"))
        {
            self.hf_token = Some(token);
        }
        if let Some(repo) = Self::get_env("HF_DATASET_REPO") {
            self.hf_dataset_repo = Some(repo);
        }
        if let Some(endpoint) = Self::get_env("HF_ENDPOINT") {
            self.hf_endpoint = endpoint;
        }
    }

    /// Get a non-empty environment variable
    fn get_env(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Ensure required directories exist, create if not
    pub fn ensure_directories(&self) -> Result<(), CordChatError> {
        if !self.log_dir.exists() {
            std::fs::create_dir_all(&self.log_dir).map_err(|e| {
                CordChatError::config(format!(
                    "Failed to create directory {}: {}",
                    self.log_dir.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// Path of the serialized vector index
    pub fn index_file(&self) -> PathBuf {
        self.index_dir.join(INDEX_FILE_NAME)
    }

    /// Whether an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key.is_some()
    }

    /// Get server bind address (host:port)
    pub fn server_bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), CordChatError> {
        for (name, url) in [
            ("OpenAI base URL", &self.openai_base_url),
            ("Hub endpoint", &self.hf_endpoint),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CordChatError::config(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        if self.embedding_model.is_empty() || self.chat_model.is_empty() {
            return Err(CordChatError::config("Model names cannot be empty"));
        }

        if self.top_k == 0 {
            return Err(CordChatError::config("top_k must be at least 1"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(CordChatError::config("Temperature must be between 0 and 2"));
        }

        if let Some(repo) = &self.hf_dataset_repo {
            let valid = repo
                .split_once('/')
                .map(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
                .unwrap_or(false);
            if !valid {
                return Err(CordChatError::config(format!(
                    "Dataset repo must look like owner/name, got '{}'",
                    repo
                )));
            }
        }

        // Validate port range
        if self.server_port == 0 {
            return Err(CordChatError::config("Server port cannot be 0"));
        }

        Ok(())
    }
}
