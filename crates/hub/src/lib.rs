//! cordchat Dataset Hub
//!
//! Client for the hosted dataset store that publishes and serves the vector index

mod client;
mod download;
mod readme;
mod types;
mod upload;

pub use client::HubClient;
pub use download::sha256_file;
pub use readme::dataset_readme;
pub use types::{CommitInfo, LfsInfo, TreeEntry, UploadItem, UploadMode, WhoAmI};
