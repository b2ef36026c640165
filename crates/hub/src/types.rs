use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Authenticated account (`GET /api/whoami-v2`)
#[derive(Debug, Clone, Deserialize)]
pub struct WhoAmI {
    pub name: String,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Entry of a repository listing (`GET /api/datasets/{repo}/tree/main/{path}`)
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    #[serde(rename = "type")]
    pub kind: String,

    pub path: String,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub oid: Option<String>,

    /// Present when the file is stored in LFS
    #[serde(default)]
    pub lfs: Option<LfsInfo>,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LfsInfo {
    /// sha256 of the file content
    pub oid: String,

    pub size: u64,
}

/// File queued for upload
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// Destination path inside the repository
    pub path_in_repo: String,

    pub content: Vec<u8>,
}

impl UploadItem {
    pub fn new(path_in_repo: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path_in_repo: path_in_repo.into(),
            content,
        }
    }
}

/// How the hub wants a file transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Regular,
    Lfs,
}

/// Result of a commit
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    #[serde(default)]
    pub commit_url: Option<String>,

    #[serde(default)]
    pub commit_oid: Option<String>,
}

// --- wire types ---

#[derive(Debug, Serialize)]
pub(crate) struct CreateRepoRequest<'a> {
    pub name: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<&'a str>,

    #[serde(rename = "type")]
    pub kind: &'a str,

    pub private: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct PreuploadRequest {
    pub files: Vec<PreuploadFile>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PreuploadFile {
    pub path: String,

    /// base64 of the first 512 bytes
    pub sample: String,

    pub size: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreuploadResponse {
    pub files: Vec<PreuploadResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PreuploadResult {
    pub path: String,

    pub upload_mode: UploadMode,

    #[serde(default)]
    pub should_ignore: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct LfsBatchRequest {
    pub operation: &'static str,
    pub transfers: Vec<&'static str>,
    pub objects: Vec<LfsObjectId>,
    pub hash_algo: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LfsObjectId {
    pub oid: String,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LfsBatchResponse {
    pub objects: Vec<LfsBatchObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LfsBatchObject {
    pub oid: String,

    #[serde(default)]
    pub size: u64,

    /// Absent when the server already has the object
    #[serde(default)]
    pub actions: Option<LfsActions>,

    #[serde(default)]
    pub error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LfsActions {
    #[serde(default)]
    pub upload: Option<LfsAction>,

    #[serde(default)]
    pub verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LfsAction {
    pub href: String,

    #[serde(default)]
    pub header: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LfsObjectError {
    pub code: u16,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_entry_parsing() {
        let body = r#"[
            {"type": "directory", "oid": "d1", "size": 0, "path": "vectorstore/sub"},
            {"type": "file", "oid": "abc", "size": 1200, "path": "vectorstore/index.json",
             "lfs": {"oid": "deadbeef", "size": 1200, "pointerSize": 132}}
        ]"#;
        let entries: Vec<TreeEntry> = serde_json::from_str(body).unwrap();
        assert!(!entries[0].is_file());
        assert!(entries[1].is_file());
        assert_eq!(entries[1].lfs.as_ref().unwrap().oid, "deadbeef");
    }

    #[test]
    fn test_preupload_response_parsing() {
        let body = r#"{"files": [
            {"path": "vectorstore/index.json", "uploadMode": "lfs", "shouldIgnore": false},
            {"path": "README.md", "uploadMode": "regular"}
        ]}"#;
        let response: PreuploadResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.files[0].upload_mode, UploadMode::Lfs);
        assert_eq!(response.files[1].upload_mode, UploadMode::Regular);
        assert!(!response.files[1].should_ignore);
    }

    #[test]
    fn test_lfs_batch_response_parsing() {
        let body = r#"{"transfer": "basic", "objects": [
            {"oid": "aa", "size": 10, "authenticated": true,
             "actions": {"upload": {"href": "https://s3/upload", "header": {"x-amz": "1"}},
                         "verify": {"href": "https://hub/verify"}}},
            {"oid": "bb", "size": 20}
        ]}"#;
        let response: LfsBatchResponse = serde_json::from_str(body).unwrap();
        let first = response.objects[0].actions.as_ref().unwrap();
        assert_eq!(first.upload.as_ref().unwrap().header["x-amz"], "1");
        assert!(first.verify.as_ref().unwrap().header.is_empty());
        assert!(response.objects[1].actions.is_none());
    }

    #[test]
    fn test_create_repo_request_serialization() {
        let request = CreateRepoRequest {
            name: "cord19_index",
            organization: None,
            kind: "dataset",
            private: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "dataset");
        assert!(json.get("organization").is_none());
    }
}
