use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hansard::{
    enrich_summaries, AgendaStore, ChromaClient, EmbedderConfig, GeminiClient, GeminiConfig,
    MappingValidationConfig, OpenAiEmbedder, Pipeline, PipelineConfig, SearchRequest,
    SearchService, SegmenterConfig, Stage1Config, UsageTracker, VectorStore,
};

#[derive(Parser)]
#[command(name = "hansard")]
#[command(author, version, about = "Council meeting transcript ingestion and search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a directory of transcript files into both stores
    Ingest {
        /// Directory containing .txt/.md transcript files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// SQLite database path
        #[arg(long, default_value = "agendas.db")]
        db: PathBuf,

        /// Chroma server URL
        #[arg(long, default_value = "http://localhost:8000")]
        chroma_url: String,

        /// Chroma collection name
        #[arg(long, default_value = "council_agendas")]
        collection: String,

        /// Meetings processed concurrently
        #[arg(long, default_value = "10")]
        max_concurrent: usize,

        /// Mapping attempts per meeting before accepting degraded output
        #[arg(long, default_value = "3")]
        max_attempts: u32,

        /// Lines two agenda ranges may share before the mapping is retried
        #[arg(long, default_value = "5")]
        overlap_tolerance: usize,

        /// Maximum chunk length in characters
        #[arg(long, default_value = "500")]
        chunk_chars: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Search ingested agendas by semantic similarity
    Search {
        /// Query text
        query: String,

        /// SQLite database path
        #[arg(long, default_value = "agendas.db")]
        db: PathBuf,

        /// Chroma server URL
        #[arg(long, default_value = "http://localhost:8000")]
        chroma_url: String,

        /// Chroma collection name
        #[arg(long, default_value = "council_agendas")]
        collection: String,

        /// Only chunks spoken by this speaker
        #[arg(long)]
        speaker: Option<String>,

        /// Only meetings on this date (YYYY.MM.DD)
        #[arg(long)]
        date: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Backfill AI summaries for agendas ingested without one
    Enrich {
        /// SQLite database path
        #[arg(long, default_value = "agendas.db")]
        db: PathBuf,

        /// Maximum number of agendas to summarize in this run
        #[arg(long, default_value = "50")]
        limit: u32,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            input_dir,
            db,
            chroma_url,
            collection,
            max_concurrent,
            max_attempts,
            overlap_tolerance,
            chunk_chars,
            verbose,
        } => {
            setup_logging(verbose);
            ingest(
                input_dir,
                db,
                chroma_url,
                collection,
                max_concurrent,
                max_attempts,
                overlap_tolerance,
                chunk_chars,
            )
            .await
        }
        Commands::Search {
            query,
            db,
            chroma_url,
            collection,
            speaker,
            date,
            limit,
            verbose,
        } => {
            setup_logging(verbose);
            search(query, db, chroma_url, collection, speaker, date, limit).await
        }
        Commands::Enrich { db, limit, verbose } => {
            setup_logging(verbose);
            enrich(db, limit).await
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

#[allow(clippy::too_many_arguments)]
async fn ingest(
    input_dir: PathBuf,
    db: PathBuf,
    chroma_url: String,
    collection: String,
    max_concurrent: usize,
    max_attempts: u32,
    overlap_tolerance: usize,
    chunk_chars: usize,
) -> Result<()> {
    let usage = Arc::new(UsageTracker::new());
    let mapper = Arc::new(GeminiClient::new(GeminiConfig::from_env()?));
    let embedder = Arc::new(OpenAiEmbedder::new(EmbedderConfig::from_env()?, usage.clone()));
    let vectors: Arc<dyn VectorStore> =
        Arc::new(ChromaClient::connect(&chroma_url, &collection).await?);

    let store = AgendaStore::connect(&db).await?;
    store.migrate().await?;

    let config = PipelineConfig {
        max_concurrent,
        stage1: Stage1Config {
            max_attempts,
            validation: MappingValidationConfig {
                overlap_tolerance_lines: overlap_tolerance,
            },
            ..Default::default()
        },
        segmenter: SegmenterConfig {
            max_chunk_chars: chunk_chars,
        },
    };

    let pipeline = Pipeline::new(mapper, embedder, vectors, store, usage, config);
    let report = pipeline.ingest_directory(&input_dir).await?;

    info!(
        "Done in {}s: {} succeeded, {} failed",
        report.elapsed_seconds(),
        report.succeeded.len(),
        report.failed.len()
    );
    for meeting in &report.succeeded {
        info!(
            "  {}: {} agendas, {} chunks{}",
            meeting.meeting_id,
            meeting.agenda_count,
            meeting.chunk_count,
            if meeting.degraded_mapping {
                " (degraded mapping)"
            } else {
                ""
            }
        );
    }
    for (meeting_id, reason) in &report.failed {
        warn!("  {} failed: {}", meeting_id, reason);
    }
    info!("Token usage: {}", report.usage);

    if report.failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} meetings failed", report.failed.len())
    }
}

async fn search(
    query: String,
    db: PathBuf,
    chroma_url: String,
    collection: String,
    speaker: Option<String>,
    date: Option<String>,
    limit: usize,
) -> Result<()> {
    let usage = Arc::new(UsageTracker::new());
    let embedder = Arc::new(OpenAiEmbedder::new(EmbedderConfig::from_env()?, usage));
    let vectors: Arc<dyn VectorStore> =
        Arc::new(ChromaClient::connect(&chroma_url, &collection).await?);
    let store = AgendaStore::connect(&db).await?;

    let service = SearchService::new(embedder, vectors, store);
    let results = service
        .search(&SearchRequest {
            query,
            speaker,
            meeting_date: date,
            limit,
        })
        .await?;

    if results.is_empty() {
        println!("No matching agendas.");
        return Ok(());
    }

    for (idx, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            idx + 1,
            result.similarity,
            result.agenda_title,
            result.status
        );
        println!("   {} | {}", result.meeting_title, result.meeting_date);
        if !result.main_speaker.is_empty() {
            println!("   Main speaker: {}", result.main_speaker);
        }
        println!("   {}", result.summary);
        if !result.meeting_url.is_empty() {
            println!("   {}", result.meeting_url);
        }
        println!();
    }
    Ok(())
}

async fn enrich(db: PathBuf, limit: u32) -> Result<()> {
    let usage = UsageTracker::new();
    let client = GeminiClient::new(GeminiConfig::from_env()?);
    let store = AgendaStore::connect(&db).await?;
    store.migrate().await?;

    let report = enrich_summaries(&client, &store, &usage, limit).await?;

    info!(
        "Enrichment done: {} updated, {} failed",
        report.updated,
        report.failed.len()
    );
    for (agenda_id, reason) in &report.failed {
        warn!("  {} failed: {}", agenda_id, reason);
    }
    info!("Token usage: {}", usage.snapshot());
    Ok(())
}
