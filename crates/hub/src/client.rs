use cordchat_common::{CordChatError, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};

use crate::types::{CreateRepoRequest, TreeEntry, WhoAmI};

/// Revision all reads and commits target
pub(crate) const REVISION: &str = "main";

/// Dataset hub API client
#[derive(Debug, Clone)]
pub struct HubClient {
    endpoint: Url,
    token: Option<String>,
    pub(crate) client: Client,
}

impl HubClient {
    /// Create new hub client
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| CordChatError::config(format!("Invalid hub endpoint '{}': {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(3600)) // 1 hour for large transfers
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        debug!("Hub client initialized: {}", endpoint);
        Ok(Self {
            endpoint,
            token: token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Browser URL of a dataset repository
    pub fn dataset_url(&self, repo_id: &str) -> String {
        format!(
            "{}/datasets/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            repo_id
        )
    }

    /// Build a URL from path segments; each segment may itself contain `/`
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CordChatError::config("Hub endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(
                segments
                    .iter()
                    .flat_map(|s| s.split('/'))
                    .filter(|s| !s.is_empty()),
            );
        Ok(url)
    }

    /// Attach the bearer token when one is configured
    pub(crate) fn auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(crate) fn require_token(&self) -> Result<()> {
        if self.token.is_none() {
            return Err(CordChatError::unauthorized(
                "Not logged in to the hub: set HF_TOKEN to an access token with write permission",
            ));
        }
        Ok(())
    }

    /// Name of the account the token belongs to
    pub async fn whoami(&self) -> Result<WhoAmI> {
        self.require_token()?;
        let url = self.url(&["api", "whoami-v2"])?;

        let response = send(self.auth(self.client.get(url))).await?;
        let response = check_status(response, "whoami").await?;
        let who: WhoAmI = response
            .json()
            .await
            .map_err(|e| CordChatError::hub(format!("Failed to parse whoami response: {}", e)))?;

        info!("Logged in to hub as: {}", who.name);
        Ok(who)
    }

    /// Create a dataset repository; an existing one is accepted when `exist_ok`
    pub async fn create_dataset_repo(&self, repo_id: &str, private: bool, exist_ok: bool) -> Result<String> {
        self.require_token()?;
        let (owner, name) = split_repo_id(repo_id)?;
        let url = self.url(&["api", "repos", "create"])?;

        let request = CreateRepoRequest {
            name,
            organization: Some(owner),
            kind: "dataset",
            private,
        };

        let response = send(self.auth(self.client.post(url)).json(&request)).await?;

        if response.status() == StatusCode::CONFLICT && exist_ok {
            info!("Dataset repository already exists: {}", repo_id);
            return Ok(self.dataset_url(repo_id));
        }

        check_status(response, "create repo").await?;
        info!("Dataset repository created: {}", repo_id);
        Ok(self.dataset_url(repo_id))
    }

    /// List files under `path` in a dataset repository (recursive)
    pub async fn list_dataset_files(&self, repo_id: &str, path: &str) -> Result<Vec<TreeEntry>> {
        split_repo_id(repo_id)?;
        let mut url = self.url(&["api", "datasets", repo_id, "tree", REVISION, path])?;
        url.query_pairs_mut().append_pair("recursive", "true");

        let response = send(self.auth(self.client.get(url))).await?;
        let response = check_status(response, "list files").await?;
        let entries: Vec<TreeEntry> = response
            .json()
            .await
            .map_err(|e| CordChatError::hub(format!("Failed to parse file listing: {}", e)))?;

        Ok(entries.into_iter().filter(|e| e.is_file()).collect())
    }
}

/// Split `owner/name`
pub(crate) fn split_repo_id(repo_id: &str) -> Result<(&str, &str)> {
    match repo_id.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(CordChatError::invalid_input(format!(
            "Repository id must look like owner/name, got '{}'",
            repo_id
        ))),
    }
}

pub(crate) async fn send(request: RequestBuilder) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| CordChatError::network(format!("Hub request failed: {}", e)))
}

/// Turn non-success responses into typed errors
pub(crate) async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail: String = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(300).collect());

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CordChatError::unauthorized(format!("{} rejected by hub ({}): {}", what, status, detail))
        }
        StatusCode::NOT_FOUND => CordChatError::not_found(format!("{}: {}", what, detail)),
        _ => CordChatError::hub(format!("{} failed with status {}: {}", what, status, detail)),
    })
}
