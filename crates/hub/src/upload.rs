use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use cordchat_common::{CordChatError, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::client::{check_status, send, split_repo_id, HubClient, REVISION};
use crate::types::{
    CommitInfo, LfsAction, LfsBatchRequest, LfsBatchResponse, LfsObjectId, PreuploadFile,
    PreuploadRequest, PreuploadResponse, UploadItem, UploadMode,
};

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";
const SAMPLE_BYTES: usize = 512;

/// Upload item with its resolved transfer mode
struct PreparedItem {
    item: UploadItem,
    mode: UploadMode,
    oid: String,
}

impl HubClient {
    /// Upload every file of `local_dir` to `path_in_repo` in one commit
    pub async fn upload_folder(
        &self,
        local_dir: &Path,
        repo_id: &str,
        path_in_repo: &str,
        commit_message: &str,
    ) -> Result<CommitInfo> {
        if !local_dir.is_dir() {
            return Err(CordChatError::not_found(format!(
                "Folder not found: {}",
                local_dir.display()
            )));
        }

        let prefix = path_in_repo.trim_matches('/');
        let mut items = Vec::new();
        for file in collect_files(local_dir).await? {
            let relative = file
                .strip_prefix(local_dir)
                .map_err(|e| CordChatError::internal(e.to_string()))?;
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let path = if prefix.is_empty() {
                relative
            } else {
                format!("{}/{}", prefix, relative)
            };
            items.push(UploadItem::new(path, tokio::fs::read(&file).await?));
        }

        if items.is_empty() {
            return Err(CordChatError::invalid_input(format!(
                "Folder is empty: {}",
                local_dir.display()
            )));
        }

        info!(
            "Uploading {} files from {} to {}/{}",
            items.len(),
            local_dir.display(),
            repo_id,
            prefix
        );
        self.upload_files(repo_id, items, commit_message).await
    }

    /// Upload a single in-memory file
    pub async fn upload_file(
        &self,
        repo_id: &str,
        path_in_repo: &str,
        content: Vec<u8>,
        commit_message: &str,
    ) -> Result<CommitInfo> {
        self.upload_files(repo_id, vec![UploadItem::new(path_in_repo, content)], commit_message)
            .await
    }

    /// Upload files in a single commit: preupload check, LFS transfer, then commit
    pub async fn upload_files(
        &self,
        repo_id: &str,
        items: Vec<UploadItem>,
        commit_message: &str,
    ) -> Result<CommitInfo> {
        self.require_token()?;
        split_repo_id(repo_id)?;

        let prepared = self.preupload(repo_id, items).await?;
        if prepared.is_empty() {
            return Err(CordChatError::invalid_input("Nothing to upload"));
        }

        let lfs: Vec<&PreparedItem> = prepared
            .iter()
            .filter(|p| p.mode == UploadMode::Lfs)
            .collect();
        if !lfs.is_empty() {
            self.upload_lfs(repo_id, &lfs).await?;
        }

        let payload = commit_payload(commit_message, &prepared)?;
        let url = self.url(&["api", "datasets", repo_id, "commit", REVISION])?;
        let response = send(
            self.auth(self.client.post(url))
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(payload),
        )
        .await?;
        let response = check_status(response, "commit").await?;
        let commit: CommitInfo = response
            .json()
            .await
            .map_err(|e| CordChatError::hub(format!("Failed to parse commit response: {}", e)))?;

        info!(
            "Committed {} files to {} ({})",
            prepared.len(),
            repo_id,
            commit.commit_oid.as_deref().unwrap_or("unknown commit")
        );
        Ok(commit)
    }

    /// Ask the hub which files go through LFS and which can be inlined
    async fn preupload(&self, repo_id: &str, items: Vec<UploadItem>) -> Result<Vec<PreparedItem>> {
        let request = PreuploadRequest {
            files: items
                .iter()
                .map(|item| PreuploadFile {
                    path: item.path_in_repo.clone(),
                    sample: BASE64.encode(&item.content[..item.content.len().min(SAMPLE_BYTES)]),
                    size: item.content.len(),
                })
                .collect(),
        };

        let url = self.url(&["api", "datasets", repo_id, "preupload", REVISION])?;
        let response = send(self.auth(self.client.post(url)).json(&request)).await?;
        let response = check_status(response, "preupload").await?;
        let result: PreuploadResponse = response
            .json()
            .await
            .map_err(|e| CordChatError::hub(format!("Failed to parse preupload response: {}", e)))?;

        let mut modes: HashMap<String, (UploadMode, bool)> = result
            .files
            .into_iter()
            .map(|f| (f.path, (f.upload_mode, f.should_ignore)))
            .collect();

        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            let (mode, ignore) = modes.remove(&item.path_in_repo).ok_or_else(|| {
                CordChatError::hub(format!("Hub did not classify {}", item.path_in_repo))
            })?;
            if ignore {
                debug!("Hub ignores {}", item.path_in_repo);
                continue;
            }
            let oid = hex::encode(Sha256::digest(&item.content));
            prepared.push(PreparedItem { item, mode, oid });
        }

        Ok(prepared)
    }

    /// Transfer LFS objects with the basic transfer adapter
    async fn upload_lfs(&self, repo_id: &str, items: &[&PreparedItem]) -> Result<()> {
        let request = LfsBatchRequest {
            operation: "upload",
            transfers: vec!["basic"],
            objects: items
                .iter()
                .map(|p| LfsObjectId {
                    oid: p.oid.clone(),
                    size: p.item.content.len() as u64,
                })
                .collect(),
            hash_algo: "sha256",
        };

        let repo_git = format!("{}.git", repo_id);
        let url = self.url(&["datasets", &repo_git, "info", "lfs", "objects", "batch"])?;
        let response = send(
            self.auth(self.client.post(url))
                .header(ACCEPT, LFS_CONTENT_TYPE)
                .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
                .body(serde_json::to_vec(&request)?),
        )
        .await?;
        let response = check_status(response, "LFS batch").await?;
        let batch: LfsBatchResponse = response
            .json()
            .await
            .map_err(|e| CordChatError::hub(format!("Failed to parse LFS batch response: {}", e)))?;

        for object in batch.objects {
            if let Some(error) = object.error {
                return Err(CordChatError::hub(format!(
                    "LFS rejected object {} ({}): {}",
                    object.oid, error.code, error.message
                )));
            }

            let Some(actions) = object.actions else {
                debug!("LFS object already present: {} ({} bytes)", object.oid, object.size);
                continue;
            };

            let item = items
                .iter()
                .find(|p| p.oid == object.oid)
                .ok_or_else(|| CordChatError::hub(format!("Unexpected LFS object {}", object.oid)))?;

            if let Some(upload) = actions.upload {
                if upload.header.contains_key("chunk_size") {
                    return Err(CordChatError::hub(format!(
                        "{} requires multipart LFS upload, which is not supported",
                        item.item.path_in_repo
                    )));
                }
                info!(
                    "Uploading LFS object for {} ({} bytes)",
                    item.item.path_in_repo,
                    item.item.content.len()
                );
                let request = with_headers(self.client.put(&upload.href), &upload)
                    .body(item.item.content.clone());
                check_status(send(request).await?, "LFS upload").await?;
            }

            if let Some(verify) = actions.verify {
                let body = LfsObjectId {
                    oid: item.oid.clone(),
                    size: item.item.content.len() as u64,
                };
                let request = with_headers(self.auth(self.client.post(&verify.href)), &verify)
                    .header(ACCEPT, LFS_CONTENT_TYPE)
                    .json(&body);
                check_status(send(request).await?, "LFS verify").await?;
            }
        }

        Ok(())
    }
}

fn with_headers(mut request: reqwest::RequestBuilder, action: &LfsAction) -> reqwest::RequestBuilder {
    for (name, value) in &action.header {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

/// NDJSON commit body: header line, then one line per file
fn commit_payload(commit_message: &str, items: &[PreparedItem]) -> Result<Vec<u8>> {
    let mut lines = vec![json!({
        "key": "header",
        "value": { "summary": commit_message, "description": "" }
    })];

    for p in items {
        lines.push(match p.mode {
            UploadMode::Regular => json!({
                "key": "file",
                "value": {
                    "content": BASE64.encode(&p.item.content),
                    "path": p.item.path_in_repo,
                    "encoding": "base64"
                }
            }),
            UploadMode::Lfs => json!({
                "key": "lfsFile",
                "value": {
                    "path": p.item.path_in_repo,
                    "algo": "sha256",
                    "oid": p.oid,
                    "size": p.item.content.len()
                }
            }),
        });
    }

    let mut payload = Vec::new();
    for line in lines {
        serde_json::to_writer(&mut payload, &line)?;
        payload.push(b'\n');
    }
    Ok(payload)
}

/// All regular files below `dir`, sorted; partial downloads and temp files are skipped
async fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    // Use a stack-based approach instead of recursion to avoid boxing
    let mut dirs_to_scan = vec![dir.to_path_buf()];
    let mut files = Vec::new();

    while let Some(current_dir) = dirs_to_scan.pop() {
        let mut entries = tokio::fs::read_dir(&current_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                dirs_to_scan.push(path);
            } else if file_type.is_file() {
                let skip = path
                    .extension()
                    .map(|ext| ext == "tmp" || ext == "part")
                    .unwrap_or(false);
                if !skip {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
