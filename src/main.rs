use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use std::io::{self, Write};
use std::path::PathBuf;

use pdf_rag::config::{ChunkPolicy, EmbeddingBackend, RagConfig, StoreBackend};
use pdf_rag::embeddings::{AnyEmbedder, HashingEmbedder};
use pdf_rag::migrate::{default_target_name, migrate_collection, DEFAULT_BATCH_SIZE};
use pdf_rag::openai::OpenAiClient;
use pdf_rag::rag::RagEngine;
use pdf_rag::session::Session;
use pdf_rag::store::{AnyStore, LocalStore, QdrantStore, VectorStore};

/// Question answering over PDF documents backed by a vector store
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    overrides: Overrides,
}

/// Options that override environment configuration
#[derive(Args, Debug)]
struct Overrides {
    /// Directory of the local vector store
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    /// Use the remote store (QDRANT_URL / QDRANT_API_KEY) instead of the local one
    #[arg(long, global = true)]
    remote: bool,

    #[arg(long, value_enum, global = true)]
    chunk_policy: Option<ChunkPolicy>,

    /// Maximum passage length in characters
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Characters shared by neighbouring passages
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    /// Number of passages retrieved per question
    #[arg(long, global = true)]
    top_k: Option<usize>,

    #[arg(long, value_enum, global = true)]
    embedder: Option<EmbeddingBackend>,

    #[arg(long, global = true)]
    embedding_model: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, split, embed and store a PDF or text file
    Ingest {
        /// Path to the document to process (supports text and PDF)
        file: PathBuf,
        #[arg(short, long)]
        collection: String,
    },
    /// Ask a single question
    Ask {
        #[arg(short, long)]
        collection: String,
        question: String,
    },
    /// Interactive question loop
    Chat {
        #[arg(short, long)]
        collection: String,
        /// Print the conversation when the session ends
        #[arg(long)]
        show_history: bool,
        /// Send earlier turns with each question so follow-ups are read in context
        #[arg(long)]
        conversational: bool,
    },
    /// List collections in the configured store
    Collections,
    /// Copy a local collection to the remote store
    Migrate {
        /// Local collection to copy
        #[arg(long)]
        from: String,
        /// Remote collection name, defaults to <FROM>_cloud
        #[arg(long)]
        to: Option<String>,
        /// Delete the remote collection first if it exists
        #[arg(long)]
        overwrite: bool,
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
}

impl Overrides {
    fn apply(&self, config: &mut RagConfig) {
        if let Some(path) = &self.store_path {
            config.store.local_path = path.clone();
        }
        if self.remote {
            config.store.backend = StoreBackend::Remote;
        }
        if let Some(policy) = self.chunk_policy {
            config.chunking.policy = policy;
        }
        if let Some(size) = self.chunk_size {
            config.chunking.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunking.overlap = overlap;
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(backend) = self.embedder {
            config.embedding.backend = backend;
        }
        if let Some(model) = &self.embedding_model {
            config.embedding.model = model.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    // Load configuration from environment, then apply command-line overrides
    let mut config = RagConfig::from_env().context("Invalid environment configuration")?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    // Check credentials before touching any store or service
    if let Err(e) = check_credentials(&cli.command, &config) {
        error!("{}", e);
        return Err(e);
    }

    match cli.command {
        Command::Ingest { file, collection } => {
            if !file.exists() {
                error!("File not found: {}", file.display());
                return Err(anyhow::anyhow!("File not found"));
            }
            // Process the document and store its passages
            let engine = build_engine(&config).await?;
            let mut session = Session::new();
            let report = engine
                .ingest_file(&mut session, &file, &collection)
                .await
                .context("Failed to process file")?;
            println!(
                "Stored {} passages from {} in collection '{}'",
                report.passages, report.source_name, report.collection
            );
        }
        Command::Ask {
            collection,
            question,
        } => {
            let engine = build_engine(&config).await?;
            let generator = build_generator(&config)?;
            let mut session = Session::with_collection(collection);
            let reply = engine.ask(&generator, &mut session, &question).await?;
            if let Some(message) = reply.error_message() {
                eprintln!("{}", message);
            }
            println!("{}", reply.answer);
            session.clear();
        }
        Command::Chat {
            collection,
            show_history,
            conversational,
        } => {
            let engine = build_engine(&config)
                .await?
                .with_conversation(conversational);
            let generator = build_generator(&config)?;
            let mut session = Session::with_collection(collection);

            // Enter interactive Q&A loop
            let stdin = io::stdin();
            let stdout = io::stdout();
            engine
                .run_query_loop(&generator, &mut session, stdin.lock(), stdout.lock())
                .await
                .context("Error in query loop")?;

            if show_history {
                let mut out = io::stdout().lock();
                writeln!(out, "\nChat history")?;
                for turn in session.history() {
                    writeln!(out, "{}: {}", turn.role, turn.content)?;
                }
            }
            session.clear();
        }
        Command::Collections => {
            let store = open_store(&config).await?;
            let names = store.list_collections().await?;
            if names.is_empty() {
                println!("No collections yet.");
            }
            for name in names {
                println!("{}", name);
            }
        }
        Command::Migrate {
            from,
            to,
            overwrite,
            batch_size,
        } => {
            let source = LocalStore::open(&config.store.local_path).await?;
            let (url, api_key) = config.require_remote()?;
            let target = QdrantStore::connect(url, api_key)
                .await
                .context("Failed to connect to the remote store")?;
            let to = to.unwrap_or_else(|| default_target_name(&from));

            // Upload in batches

            let report =
                migrate_collection(&source, &target, &from, &to, overwrite, batch_size).await?;
            println!(
                "Uploaded {} records from '{}' to remote collection '{}' in {} batches",
                report.records, report.source, report.target, report.batches
            );
        }
    }

    Ok(())
}

/// Stop before any pipeline step when an action lacks its credential
fn check_credentials(command: &Command, config: &RagConfig) -> Result<()> {
    match command {
        Command::Ingest { .. } if config.embeds_remotely() => {
            config.require_api_key()?;
        }
        Command::Ask { .. } | Command::Chat { .. } => {
            config.require_api_key()?;
        }
        Command::Migrate { .. } => {
            config.require_remote()?;
        }
        _ => {}
    }
    if config.store.backend == StoreBackend::Remote {
        config.require_remote()?;
    }
    Ok(())
}

async fn open_store(config: &RagConfig) -> Result<AnyStore> {
    match config.store.backend {
        StoreBackend::Local => Ok(AnyStore::Local(
            LocalStore::open(&config.store.local_path).await?,
        )),
        StoreBackend::Remote => {
            let (url, api_key) = config.require_remote()?;
            let store = QdrantStore::connect(url, api_key)
                .await
                .context("Failed to connect to the remote store")?;
            Ok(AnyStore::Remote(store))
        }
    }
}

fn build_embedder(config: &RagConfig) -> Result<AnyEmbedder> {
    match config.embedding.backend {
        EmbeddingBackend::Openai => Ok(AnyEmbedder::OpenAi(OpenAiClient::new(
            &config.api,
            &config.embedding.model,
            config.generation.clone(),
        )?)),
        EmbeddingBackend::Hashing => {
            info!(
                "Using offline hashing embedder ({} dimensions)",
                config.embedding.hashing_dimensions
            );
            Ok(AnyEmbedder::Hashing(HashingEmbedder::new(
                config.embedding.hashing_dimensions,
            )))
        }
    }
}

fn build_generator(config: &RagConfig) -> Result<OpenAiClient> {
    OpenAiClient::new(
        &config.api,
        &config.embedding.model,
        config.generation.clone(),
    )
}

async fn build_engine(config: &RagConfig) -> Result<RagEngine<AnyEmbedder, AnyStore>> {
    let embedder = build_embedder(config)?;
    let store = open_store(config).await?;
    Ok(RagEngine::new(
        embedder,
        store,
        config.chunking,
        config.top_k,
    ))
}
