//! Local setup report for `cordchat check`

use cordchat_common::AppConfig;
use cordchat_hub::HubClient;
use cordchat_llm::LlmClient;
use cordchat_vector::VectorStore;
use std::path::Path;

/// Findings of a setup check
#[derive(Debug, Default)]
pub struct CheckReport {
    pub passed: Vec<String>,
    pub notes: Vec<String>,
    pub issues: Vec<String>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn print(&self) {
        println!("Setup Summary");
        println!("{}", "-".repeat(20));
        for item in &self.passed {
            println!("[ok]   {}", item);
        }
        for item in &self.notes {
            println!("[info] {}", item);
        }

        if self.is_ok() {
            println!("\nEverything looks good.");
        } else {
            println!("\nIssues to resolve:");
            for item in &self.issues {
                println!("[fail] {}", item);
            }
            println!("\n{} issue(s) found.", self.issues.len());
        }
    }
}

/// Check configuration, the local index and repository hygiene
pub async fn check_local(config: &AppConfig, project_root: &Path) -> CheckReport {
    let mut report = CheckReport::default();

    if config.has_api_key() {
        report.passed.push("OPENAI_API_KEY found".to_string());
    } else {
        report
            .issues
            .push("OPENAI_API_KEY not set (add OPENAI_API_KEY=... to .env)".to_string());
    }

    if let Err(e) = config.validate() {
        report.issues.push(format!("Invalid configuration: {}", e));
    }

    let index_dir = &config.index_dir;
    if VectorStore::exists(index_dir) {
        let files = count_files(index_dir);
        match VectorStore::load(index_dir).await {
            Ok(store) => {
                let (count, model, dim) = store.stats().await;
                report.passed.push(format!(
                    "Local index at {} ({} files, {} passages, {} dim {})",
                    index_dir.display(),
                    files,
                    count,
                    model,
                    dim
                ));
            }
            Err(e) => report
                .issues
                .push(format!("Local index at {} cannot be loaded: {}", index_dir.display(), e)),
        }
    } else if config.hf_dataset_repo.is_some() {
        report.notes.push(format!(
            "No local index at {} (will download from the dataset repository on first run)",
            index_dir.display()
        ));
    } else {
        report.issues.push(format!(
            "No local index at {} and HF_DATASET_REPO is not set",
            index_dir.display()
        ));
    }

    match &config.hf_dataset_repo {
        Some(repo) => report.passed.push(format!("Dataset repository: {}", repo)),
        None => report
            .notes
            .push("HF_DATASET_REPO not set (index must be built locally)".to_string()),
    }

    if project_root.join(".git").exists() {
        match std::fs::read_to_string(project_root.join(".gitignore")) {
            Ok(content) if gitignore_excludes(&content, index_dir) => {
                report.passed.push("Index directory excluded from git".to_string());
            }
            Ok(_) => report.issues.push(format!(
                "Index directory {} is not excluded in .gitignore",
                index_dir.display()
            )),
            Err(_) => report.issues.push(".gitignore not found".to_string()),
        }
    } else {
        report.notes.push("Not a git repository".to_string());
    }

    report
}

/// Probe the chat API and the dataset hub
pub async fn check_online(config: &AppConfig, report: &mut CheckReport) {
    match cordchat_server::build_llm(config) {
        Ok(llm) => match llm.test_connection().await {
            Ok(true) => report
                .passed
                .push(format!("API reachable at {}", config.openai_base_url)),
            Ok(false) => report
                .issues
                .push(format!("API at {} rejected the key", config.openai_base_url)),
            Err(e) => report.issues.push(format!("API unreachable: {}", e)),
        },
        Err(e) => report.notes.push(format!("API check skipped: {}", e)),
    }

    let hub = match HubClient::new(&config.hf_endpoint, config.hf_token.clone()) {
        Ok(hub) => hub,
        Err(e) => {
            report.issues.push(e.to_string());
            return;
        }
    };

    if hub.has_token() {
        match hub.whoami().await {
            Ok(who) => report.passed.push(format!("Logged in to the hub as {}", who.name)),
            Err(e) => report.issues.push(format!("Hub login failed: {}", e)),
        }
    }

    if let Some(repo) = &config.hf_dataset_repo {
        match hub.list_dataset_files(repo, &config.hf_path_in_repo).await {
            Ok(files) if !files.is_empty() => report.passed.push(format!(
                "Dataset {} has {} index files",
                repo,
                files.len()
            )),
            Ok(_) => report
                .issues
                .push(format!("Dataset {} has no files under {}", repo, config.hf_path_in_repo)),
            Err(e) => report.issues.push(format!("Dataset {} not reachable: {}", repo, e)),
        }
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| {
                    let path = e.path();
                    if path.is_dir() {
                        count_files(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Whether a `.gitignore` body has a line matching the index directory name
fn gitignore_excludes(content: &str, index_dir: &Path) -> bool {
    let Some(name) = index_dir.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.starts_with('#'))
        .any(|line| line.trim_start_matches("./").trim_matches('/') == name)
}
