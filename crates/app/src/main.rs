use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_rag_core::{
    discover_pdf_files, AnswerGenerator, AppConfig, EmbedderCache, IngestStatus,
    IngestionOptions, OpenRouterGenerator, Pipeline, QdrantStore, DEFAULT_ANSWER_MODEL,
    DEFAULT_EMBEDDING_MODEL,
};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant API key
    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    /// HTTP embedding server; omit to use the offline hashing embedder
    #[arg(long, env = "EMBEDDING_ENDPOINT")]
    embedding_endpoint: Option<String>,

    /// Default embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest PDF files into a hybrid collection.
    Ingest {
        /// Folder scanned recursively for PDFs.
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Individual PDF files; may be repeated.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Target collection, created lazily on first ingestion.
        #[arg(long, default_value = "default_collection")]
        collection: String,
        /// Maximum characters per chunk.
        #[arg(long, default_value_t = 1000)]
        chunk_size: usize,
        /// Characters of context carried between adjacent chunks.
        #[arg(long, default_value_t = 200)]
        chunk_overlap: usize,
        /// Embedding model override for this run.
        #[arg(long)]
        model: Option<String>,
    },
    /// Query a collection and print ranked sources.
    Query {
        #[arg(long)]
        collection: String,
        /// Search query text.
        #[arg(long)]
        query: String,
        /// Number of sources to return.
        #[arg(long, default_value_t = pdf_rag_core::DEFAULT_RESULT_LIMIT)]
        limit: usize,
        /// Embedding model override for this run.
        #[arg(long)]
        model: Option<String>,
        /// Generate an answer from the sources via OpenRouter.
        #[arg(long, default_value_t = false)]
        answer: bool,
        /// Answer token budget.
        #[arg(long, default_value_t = 500)]
        max_tokens: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = QdrantStore::new(&cli.qdrant_url, cli.qdrant_api_key.clone())
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let embedders = EmbedderCache::new(
        cli.embedding_endpoint.clone(),
        cli.embedding_model.clone(),
    );
    let pipeline = Pipeline::new(store, embedders);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    match cli.command {
        Command::Ingest {
            folder,
            files,
            collection,
            chunk_size,
            chunk_overlap,
            model,
        } => {
            let mut paths = files;
            if let Some(folder) = folder {
                paths.extend(discover_pdf_files(&folder));
            }
            if paths.is_empty() {
                anyhow::bail!("no PDF files given; pass --folder or --file");
            }

            let options = IngestionOptions {
                model_name: model,
                chunk_size,
                chunk_overlap,
            };

            info!(files = paths.len(), collection = %collection, "ingesting");
            let batch = pipeline
                .process_documents(&paths, &collection, &options)
                .await;

            for report in &batch.reports {
                match report.status {
                    IngestStatus::Success => {
                        println!(
                            "ok    {} ({} chunks)",
                            report.filename, report.chunks
                        );
                    }
                    IngestStatus::Error => {
                        warn!(filename = %report.filename, reason = %report.message, "skipped pdf");
                        println!("error {}: {}", report.filename, report.message);
                    }
                }
            }
            println!(
                "Processed {}/{} files successfully",
                batch.succeeded, batch.attempted
            );
        }
        Command::Query {
            collection,
            query,
            limit,
            model,
            answer,
            max_tokens,
        } => {
            let sources = pipeline
                .search(&collection, &query, model.as_deref(), limit)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if sources.is_empty() {
                println!("No relevant information found.");
                return Ok(());
            }

            println!("query: {query}");
            for source in &sources {
                println!(
                    "[{:.4}] {} page={} url={}",
                    source.score, source.filename, source.page_number, source.url
                );
                println!("  {}", source.text);
            }

            if answer {
                let config = AppConfig::from_env();
                let api_key = config
                    .openrouter_api_key
                    .ok_or_else(|| anyhow::anyhow!("OPENROUTER_API_KEY not set"))?;
                let generator = OpenRouterGenerator::new(
                    config.openrouter_api_base,
                    api_key,
                    DEFAULT_ANSWER_MODEL,
                );

                let text = generator
                    .generate(&query, &sources, max_tokens)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                println!("\nanswer:\n{text}");

                let mut seen = HashSet::new();
                let unique_files: Vec<&str> = sources
                    .iter()
                    .map(|source| source.filename.as_str())
                    .filter(|filename| !filename.is_empty() && seen.insert(*filename))
                    .collect();
                println!("sources: {}", unique_files.join(", "));
            }
        }
    }

    Ok(())
}
