use cordchat_common::{CordChatError, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};

use crate::client::{check_status, send, split_repo_id, HubClient, REVISION};
use crate::types::TreeEntry;

impl HubClient {
    /// Download every file under `path_in_repo` into `dest_dir`
    ///
    /// Files keep their path relative to `path_in_repo`. Returns the written paths.
    pub async fn download_dataset_folder(
        &self,
        repo_id: &str,
        path_in_repo: &str,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let prefix = path_in_repo.trim_matches('/');
        let files = self.list_dataset_files(repo_id, prefix).await?;
        if files.is_empty() {
            return Err(CordChatError::not_found(format!(
                "No files under '{}' in dataset {}",
                prefix, repo_id
            )));
        }

        info!(
            "Downloading {} files from {}/{} to {}",
            files.len(),
            repo_id,
            prefix,
            dest_dir.display()
        );

        let mut written = Vec::with_capacity(files.len());
        for entry in &files {
            let relative = relative_path(&entry.path, prefix)?;
            let dest = dest_dir.join(relative);
            self.download_dataset_file(repo_id, entry, &dest).await?;
            written.push(dest);
        }

        Ok(written)
    }

    /// Download one listed file, verifying its size and (for LFS files) its sha256
    pub async fn download_dataset_file(&self, repo_id: &str, entry: &TreeEntry, dest: &Path) -> Result<()> {
        split_repo_id(repo_id)?;
        let url = self.url(&["datasets", repo_id, "resolve", REVISION, &entry.path])?;
        let expected_size = entry.lfs.as_ref().map(|l| l.size).unwrap_or(entry.size);

        info!("Downloading {} ({:.1} MB)", entry.path, expected_size as f64 / 1024.0 / 1024.0);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let response = send(self.auth(self.client.get(url))).await?;
        let response = check_status(response, "download").await?;

        let pb = ProgressBar::new(expected_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        // Write to temporary file first
        let temp_path = temp_path_for(dest);
        let written = write_verified(response.bytes_stream(), entry, expected_size, &temp_path, &pb).await;
        pb.finish_and_clear();

        if let Err(e) = written {
            if let Err(remove_err) = fs::remove_file(&temp_path).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", temp_path.display(), remove_err);
                }
            }
            return Err(e);
        }

        // Rename to final destination
        fs::rename(&temp_path, dest).await?;

        info!("Download successful: {}", dest.display());
        Ok(())
    }
}

/// Stream a download into `temp_path`, then check its size and LFS checksum
async fn write_verified<S, B>(
    stream: S,
    entry: &TreeEntry,
    expected_size: u64,
    temp_path: &Path,
    pb: &ProgressBar,
) -> Result<()>
where
    S: futures::Stream<Item = reqwest::Result<B>>,
    B: AsRef<[u8]>,
{
    let mut stream = std::pin::pin!(stream);
    let mut file = fs::File::create(temp_path).await?;
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| CordChatError::network(format!("Download error: {}", e)))?;
        let chunk = chunk.as_ref();
        file.write_all(chunk).await?;
        hasher.update(chunk);
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.sync_all().await?;
    drop(file);

    if downloaded != expected_size {
        return Err(CordChatError::hub(format!(
            "Downloaded {} has {} bytes, expected {}",
            entry.path, downloaded, expected_size
        )));
    }

    if let Some(lfs) = &entry.lfs {
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(&lfs.oid) {
            return Err(CordChatError::hub(format!(
                "Checksum mismatch for {}: expected {}, got {}",
                entry.path, lfs.oid, actual
            )));
        }
    }

    Ok(())
}

/// Path of `file_path` relative to the repository folder `prefix`
fn relative_path<'a>(file_path: &'a str, prefix: &str) -> Result<&'a str> {
    if prefix.is_empty() {
        return Ok(file_path);
    }

    let relative = file_path
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| {
            CordChatError::hub(format!("Listed file {} is outside folder {}", file_path, prefix))
        })?;

    if relative.split('/').any(|part| part == ".." || part.is_empty()) {
        warn!("Refusing suspicious path from hub listing: {}", file_path);
        return Err(CordChatError::hub(format!("Invalid file path in listing: {}", file_path)));
    }

    Ok(relative)
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Hex sha256 of a file's content
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpResponse, HttpServer};

    const INDEX_BODY: &str = "{\"entries\": []}";

    fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("vectorstore/index.json", "vectorstore").unwrap(), "index.json");
        assert_eq!(relative_path("vectorstore/a/b.bin", "vectorstore").unwrap(), "a/b.bin");
        assert_eq!(relative_path("index.json", "").unwrap(), "index.json");
        assert!(relative_path("other/index.json", "vectorstore").is_err());
        assert!(relative_path("vectorstore/../../etc/passwd", "vectorstore").is_err());
    }

    #[test]
    fn test_temp_path_for() {
        assert_eq!(
            temp_path_for(Path::new("/tmp/x/index.json")),
            PathBuf::from("/tmp/x/index.json.part")
        );
    }

    #[tokio::test]
    async fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    /// Serves a listing plus file content shaped like the hub's API
    async fn start_fake_hub(lfs_oid: String) -> String {
        let listing = serde_json::json!([
            {"type": "directory", "oid": "d", "size": 0, "path": "vectorstore/nested"},
            {"type": "file", "oid": "x", "size": INDEX_BODY.len(), "path": "vectorstore/index.json",
             "lfs": {"oid": lfs_oid, "size": INDEX_BODY.len(), "pointerSize": 130}},
            {"type": "file", "oid": "y", "size": 5, "path": "vectorstore/nested/meta.txt"}
        ]);

        let server = HttpServer::new(move || {
            let listing = listing.clone();
            App::new()
                .route(
                    "/api/datasets/{owner}/{name}/tree/main/{path:.*}",
                    web::get().to(move || {
                        let listing = listing.clone();
                        async move { HttpResponse::Ok().json(listing) }
                    }),
                )
                .route(
                    "/datasets/{owner}/{name}/resolve/main/vectorstore/index.json",
                    web::get().to(|| async { HttpResponse::Ok().body(INDEX_BODY) }),
                )
                .route(
                    "/datasets/{owner}/{name}/resolve/main/vectorstore/nested/meta.txt",
                    web::get().to(|| async { HttpResponse::Ok().body("hello") }),
                )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    #[actix_web::test]
    async fn test_download_folder_verifies_and_places_files() {
        let endpoint = start_fake_hub(sha256_hex(INDEX_BODY.as_bytes())).await;
        let client = HubClient::new(&endpoint, None).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let written = client
            .download_dataset_folder("someone/cord19_index", "vectorstore", dir.path())
            .await
            .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("index.json")).unwrap(), INDEX_BODY);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nested/meta.txt")).unwrap(),
            "hello"
        );
        assert!(!dir.path().join("index.json.part").exists());
    }

    #[actix_web::test]
    async fn test_download_rejects_checksum_mismatch() {
        let endpoint = start_fake_hub("0".repeat(64)).await;
        let client = HubClient::new(&endpoint, None).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let result = client
            .download_dataset_folder("someone/cord19_index", "vectorstore", dir.path())
            .await;

        assert!(matches!(result, Err(CordChatError::Hub(_))));
        assert!(!dir.path().join("index.json").exists());
        assert!(!dir.path().join("index.json.part").exists());
    }

    #[actix_web::test]
    async fn test_interrupted_download_leaves_no_partial_file() {
        let listing = serde_json::json!([
            {"type": "file", "oid": "x", "size": 1024, "path": "vectorstore/index.json"}
        ]);

        let server = HttpServer::new(move || {
            let listing = listing.clone();
            App::new()
                .route(
                    "/api/datasets/{owner}/{name}/tree/main/{path:.*}",
                    web::get().to(move || {
                        let listing = listing.clone();
                        async move { HttpResponse::Ok().json(listing) }
                    }),
                )
                .route(
                    "/datasets/{owner}/{name}/resolve/main/vectorstore/index.json",
                    web::get().to(|| async {
                        // First chunk arrives, then the connection breaks
                        let chunks: Vec<std::io::Result<web::Bytes>> = vec![
                            Ok(web::Bytes::from_static(b"{\"entries\": [")),
                            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection lost")),
                        ];
                        HttpResponse::Ok().streaming(futures::stream::iter(chunks))
                    }),
                )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());

        let client = HubClient::new(&format!("http://{}", addr), None).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let result = client
            .download_dataset_folder("someone/cord19_index", "vectorstore", dir.path())
            .await;

        assert!(result.is_err());
        assert!(!dir.path().join("index.json").exists());
        assert!(!dir.path().join("index.json.part").exists());
    }
}
