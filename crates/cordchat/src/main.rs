mod check;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cordchat_common::{logger, AppConfig};
use cordchat_hub::{dataset_readme, HubClient};
use cordchat_vector::{read_papers_jsonl, IngestOptions, Ingestor, VectorStore};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    if let Some(root) = find_project_root() {
        let env_path = root.join(".env");
        if env_path.exists() {
            dotenv::from_path(&env_path).ok();
        }
    } else {
        // Fallback to default dotenv behavior
        dotenv::dotenv().ok();
    }
}

#[derive(Parser)]
#[command(name = "cordchat")]
#[command(about = "cordchat - COVID-19 research chatbot over CORD-19 abstracts", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Vector index directory
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },

    /// Embed papers from a JSONL file into the local index
    Ingest {
        /// One JSON paper record per line (cord_uid, title, abstract, publish_time, ...)
        #[arg(long)]
        input: PathBuf,

        /// Number of most recent papers to keep
        #[arg(long, default_value_t = 2000)]
        limit: usize,

        /// Passage size in approximate tokens
        #[arg(long, default_value_t = 500)]
        chunk_tokens: usize,

        /// Overlap between passages in approximate tokens
        #[arg(long, default_value_t = 50)]
        overlap: usize,
    },

    /// Publish the local index as a dataset on the hub
    Upload {
        /// Repository owner (defaults to the logged-in account)
        #[arg(long)]
        username: Option<String>,

        /// Dataset repository name
        #[arg(long, default_value = "cord19_index")]
        repo_name: String,

        /// Create the repository as private
        #[arg(long)]
        private: bool,
    },

    /// Answer one question from the command line
    Ask {
        question: String,
    },

    /// Check the local setup
    Check {
        /// Also probe the chat API and the dataset hub
        #[arg(long)]
        online: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load environment variables from .env at project root
    load_dotenv_from_project_root();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.index_dir {
        config.index_dir = dir;
    }

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => {
            // Override with CLI arguments
            if let Some(host) = host {
                config.server_host = host;
            }
            if let Some(port) = port {
                config.server_port = port;
            }

            logger::setup_logging(&config.log_dir, &config.log_level)?;

            tracing::info!("cordchat starting...");
            tracing::info!("Configuration loaded:");
            tracing::info!("  Bind: {}", config.server_bind_address());
            tracing::info!("  Index: {}", config.index_dir.display());
            tracing::info!("  Chat model: {}", config.chat_model);

            println!("Server listening on http://{}", config.server_bind_address());

            cordchat_server::start_server(config).await?;
        }
        Commands::Ingest {
            input,
            limit,
            chunk_tokens,
            overlap,
        } => {
            logger::setup_console_logging(&config.log_level)?;
            let options = IngestOptions {
                limit,
                chunk_tokens,
                overlap_tokens: overlap,
                ..Default::default()
            };
            ingest(&config, &input, options).await?;
        }
        Commands::Upload {
            username,
            repo_name,
            private,
        } => {
            logger::setup_console_logging(&config.log_level)?;
            return upload(&config, username, &repo_name, private).await;
        }
        Commands::Ask { question } => {
            logger::setup_console_logging("warn")?;
            ask(&config, &question).await?;
        }
        Commands::Check { online } => {
            logger::setup_console_logging("warn")?;
            let root = find_project_root()
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("."));

            let mut report = check::check_local(&config, &root).await;
            if online {
                check::check_online(&config, &mut report).await;
            }
            report.print();

            if !report.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn ingest(config: &AppConfig, input: &Path, options: IngestOptions) -> Result<()> {
    let llm = cordchat_server::build_llm(config)?;
    let papers = read_papers_jsonl(input)
        .await
        .with_context(|| format!("Failed to read papers from {}", input.display()))?;

    let ingestor = Ingestor::new(llm, &config.embedding_model, options);
    let (index, report) = ingestor.build(papers).await?;

    let store = VectorStore::new(index, &config.index_dir);
    let path = store.save().await?;

    println!("Papers read:     {}", report.papers_read);
    println!("Papers selected: {}", report.papers_selected);
    println!("Passages:        {}", report.passages);
    println!("Dimension:       {}", report.embedding_dim);
    println!("Index saved to {}", path.display());
    Ok(())
}

async fn upload(
    config: &AppConfig,
    username: Option<String>,
    repo_name: &str,
    private: bool,
) -> Result<ExitCode> {
    let hub = HubClient::new(&config.hf_endpoint, config.hf_token.clone())?;

    let who = match hub.whoami().await {
        Ok(who) => who,
        Err(e) => {
            eprintln!("Not logged in to the hub: {}", e);
            eprintln!("Set HF_TOKEN to an access token with write permission");
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("Logged in as: {}", who.name);

    let store = match VectorStore::load(&config.index_dir).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Run `cordchat ingest` first");
            return Ok(ExitCode::FAILURE);
        }
    };
    let (passages, _, _) = store.stats().await;

    let owner = username.unwrap_or(who.name);
    let repo_id = format!("{}/{}", owner, repo_name);
    println!("Uploading {} to {}", config.index_dir.display(), hub.dataset_url(&repo_id));

    hub.create_dataset_repo(&repo_id, private, true).await?;
    hub.upload_folder(
        &config.index_dir,
        &repo_id,
        &config.hf_path_in_repo,
        "Upload vector index",
    )
    .await?;

    let readme = dataset_readme(&repo_id, &config.hf_path_in_repo, Some(passages));
    hub.upload_file(&repo_id, "README.md", readme.into_bytes(), "Add dataset card")
        .await?;

    println!("Uploaded index to: {}", hub.dataset_url(&repo_id));
    println!("Set HF_DATASET_REPO={} to serve it", repo_id);
    Ok(ExitCode::SUCCESS)
}

async fn ask(config: &AppConfig, question: &str) -> Result<()> {
    let chain = cordchat_server::build_chain(config).await?;
    let result = chain.invoke(question).await?;

    println!("{}", result.answer);
    if !result.sources.is_empty() {
        println!("\nSources:");
        for (i, source) in result.sources.iter().enumerate() {
            println!("\nSource {}: {}", i + 1, source.text);
        }
    }
    Ok(())
}
