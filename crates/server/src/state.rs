use cordchat_common::{AppConfig, Result};
use std::sync::Arc;
use tracing::error;

use crate::chain::RagChain;
use crate::sessions::SessionStore;

/// Shared application state
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Question-answering chain; `None` when startup could not build it
    pub chain: Option<Arc<RagChain>>,

    /// Why the chain is missing
    pub init_error: Option<String>,

    /// Chat sessions
    pub sessions: SessionStore,
}

impl AppState {
    /// Create new application state
    ///
    /// A chain that failed to build is recorded, not fatal: the UI stays up and reports it.
    pub fn new(config: AppConfig, chain: Result<RagChain>) -> Self {
        let (chain, init_error) = match chain {
            Ok(chain) => (Some(Arc::new(chain)), None),
            Err(e) => {
                error!("Failed to initialize RAG chain: {}", e);
                (None, Some(e.to_string()))
            }
        };

        let sessions = SessionStore::new(config.session_ttl_secs, config.max_sessions);

        Self {
            config,
            chain,
            init_error,
            sessions,
        }
    }
}
