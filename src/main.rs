//! # Advisor KB CLI (`akb`)
//!
//! The `akb` binary administers the knowledge base and runs the portal API
//! server. It covers the same pipeline the HTTP surface exposes: document
//! ingestion, status inspection, deletion, and grounded chat.
//!
//! ## Usage
//!
//! ```bash
//! akb --config ./config/advisor.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `akb init` | Create the SQLite database and run schema migrations |
//! | `akb ingest <path>` | Upload and process a local file |
//! | `akb documents list` | List all documents with status |
//! | `akb documents status <id>` | Show one document's processing status |
//! | `akb documents delete <id>` | Remove a document, its file, and its vectors |
//! | `akb chat "<message>"` | Ask a grounded question from the terminal |
//! | `akb serve api` | Start the portal HTTP server |

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use advisor_kb::config;
use advisor_kb::models::{Document, DocumentStatus};
use advisor_kb::server;
use advisor_kb::services::Services;
use advisor_kb::{db, migrate};

/// Advisor KB — document ingestion and grounded chat for a counseling portal.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/advisor.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "akb",
    about = "Advisor KB — document ingestion and retrieval-grounded chat",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/advisor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents and users tables.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Upload and process one local file.
    ///
    /// Runs the full pipeline inline (extract, chunk, embed, index) and
    /// prints the resulting status.
    Ingest {
        /// Path to a supported file (txt, srt, vtt, pdf, docx).
        path: PathBuf,
    },

    /// Inspect or remove registered documents.
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },

    /// Ask a question answered only from indexed documents.
    Chat {
        /// The question to ask.
        message: String,
    },

    /// Start the portal HTTP server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum DocumentsAction {
    /// List all documents, newest first.
    List,

    /// Show one document's processing status.
    Status {
        /// Document id.
        id: String,

        /// Poll until the document leaves `processing` (bounded at 60s).
        #[arg(long)]
        wait: bool,
    },

    /// Delete a document: raw file, vectors, then the registry record.
    Delete {
        /// Document id.
        id: String,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// Serve the portal JSON API on `[server].bind`.
    Api,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "advisor_kb=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.registry.db_path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path } => {
            let services = Services::from_config(&cfg).await?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("path has no filename: {}", path.display()))?
                .to_string();
            let bytes = std::fs::read(&path)?;

            let id = Uuid::new_v4().to_string();
            let stored = services.store.save(&id, &filename, &bytes)?;
            let doc = Document {
                id: id.clone(),
                filename,
                storage_location: stored.to_string_lossy().into_owned(),
                uploaded_by: "cli".to_string(),
                uploaded_at: Utc::now(),
                status: DocumentStatus::Processing,
                chunk_count: 0,
                error_message: None,
            };
            services.registry.create(&doc).await?;

            match services.ingestor.ingest(&doc).await {
                Ok(chunks) => println!("Ingested {} ({} chunks): ready", id, chunks),
                Err(e) => println!("Ingestion failed for {}: {}", id, e),
            }
        }
        Commands::Documents { action } => {
            let services = Services::from_config(&cfg).await?;
            match action {
                DocumentsAction::List => {
                    let mut docs = services.registry.list().await?;
                    docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
                    if docs.is_empty() {
                        println!("No documents.");
                    }
                    for d in docs {
                        println!(
                            "{}  {:<10}  {:>4} chunks  {}  {}",
                            d.id,
                            d.status.as_str(),
                            d.chunk_count,
                            d.uploaded_at.format("%Y-%m-%d %H:%M"),
                            d.filename
                        );
                    }
                }
                DocumentsAction::Status { id, wait } => {
                    let attempts = if wait { 120 } else { 1 };
                    let mut doc = services.registry.get(&id).await?;
                    for _ in 1..attempts {
                        if doc.status != DocumentStatus::Processing {
                            break;
                        }
                        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                        doc = services.registry.get(&id).await?;
                    }
                    println!("id:          {}", doc.id);
                    println!("filename:    {}", doc.filename);
                    println!("status:      {}", doc.status.as_str());
                    println!("chunks:      {}", doc.chunk_count);
                    println!("uploaded_at: {}", doc.uploaded_at.to_rfc3339());
                    if let Some(msg) = doc.error_message {
                        println!("error:       {}", msg);
                    }
                }
                DocumentsAction::Delete { id } => {
                    let doc = services.registry.get(&id).await?;
                    services.ingestor.delete_document(&doc).await?;
                    println!("Deleted {}", id);
                }
            }
        }
        Commands::Chat { message } => {
            let services = Services::from_config(&cfg).await?;
            let reply = services
                .responder
                .answer(&message, &[])
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("{}", reply.response);
            if !reply.sources.is_empty() {
                println!();
                println!("Sources:");
                for s in reply.sources {
                    println!("  {} (chunk {}, score {:.2})", s.filename, s.chunk_index, s.score);
                }
            }
        }
        Commands::Serve {
            service: ServeService::Api,
        } => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
