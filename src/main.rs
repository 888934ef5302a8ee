//! CLI interface for the budget index

use anyhow::{Context, Result};
use budget_index::config::{DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_STORAGE_ROOT, DEFAULT_TOP_K};
use budget_index::{BudgetService, IngestInput, ServiceConfig, Vector, EMBEDDING_DIM};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "budget-index")]
#[command(about = "Similarity search and budget estimation over image embeddings", long_about = None)]
struct Cli {
    /// Directory holding the persisted index and metadata
    #[arg(long, env = "BUDGET_INDEX_STORAGE_ROOT", default_value = DEFAULT_STORAGE_ROOT)]
    storage_root: PathBuf,

    /// Best-match similarity an estimate needs to pass the threshold
    #[arg(long, env = "BUDGET_INDEX_THRESHOLD", default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    threshold: f32,

    /// Neighbours used when a request gives no top_k
    #[arg(long, env = "BUDGET_INDEX_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Embedding dimension
    #[arg(long, default_value_t = EMBEDDING_DIM)]
    dimension: usize,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index an embedding with its metadata
    Index {
        /// Embedding as comma-separated values, or @path to a JSON array
        #[arg(short, long)]
        vector: String,
        /// Metadata text, usually a JSON object
        #[arg(short, long)]
        metadata: Option<String>,
        /// Budget for this item; overrides a budget in the metadata
        #[arg(short, long)]
        budget: Option<String>,
        /// Caller reference for this item
        #[arg(short, long)]
        reference_id: Option<String>,
        /// Status for this item; overrides a status in the metadata
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Search for similar embeddings
    Search {
        /// Query embedding as comma-separated values, or @path to a JSON array
        query: String,
        /// Number of results to return
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Estimate a budget from the nearest neighbours
    Estimate {
        /// Query embedding as comma-separated values, or @path to a JSON array
        query: String,
        /// Number of neighbours to weigh
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Show index statistics
    Stats,
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, env = "BUDGET_INDEX_ADDR", default_value = "0.0.0.0:8001")]
        addr: String,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse an embedding argument: inline comma-separated floats, or `@file`
/// naming a JSON array.
fn parse_vector_arg(arg: &str) -> Result<Vector> {
    match arg.strip_prefix('@') {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading embedding from {}", path))?;
            let data: Vec<f32> = serde_json::from_str(&text)
                .with_context(|| format!("parsing embedding in {}", path))?;
            Ok(Vector::new(data))
        }
        None => Ok(Vector::from_str(arg)?),
    }
}

fn run(service: &BudgetService, command: Commands) -> Result<()> {
    match command {
        Commands::Index {
            vector,
            metadata,
            budget,
            reference_id,
            status,
        } => {
            let v = parse_vector_arg(&vector)?;
            let input = IngestInput {
                metadata,
                budget,
                reference_id,
                status,
            };
            let ingested = service.ingest(v, &input)?;
            println!("Indexed entry {}", ingested.ordinal);
            println!("{}", serde_json::to_string_pretty(&ingested.record)?);
        }
        Commands::Search { query, k } => {
            let q = parse_vector_arg(&query)?;
            let results = service.search(q, k)?;

            if results.is_empty() {
                println!("No results found (index is empty)");
            } else {
                println!("Top {} results:", results.len());
                for (i, result) in results.iter().enumerate() {
                    let budget = result
                        .budget
                        .map_or_else(|| "-".to_string(), |b| format!("{:.2}", b));
                    println!(
                        "{}. {} (similarity: {:.4}, budget: {})",
                        i + 1,
                        result.reference_id,
                        result.similarity,
                        budget
                    );
                }
            }
        }
        Commands::Estimate { query, k } => {
            let q = parse_vector_arg(&query)?;
            let estimate = service.estimate(q, k)?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Commands::Stats => {
            let stats = service.stats()?;
            println!("Entries:      {}", stats.entries);
            println!("Dimension:    {}", stats.dimension);
            println!("Storage root: {}", stats.storage_root.display());
        }
        Commands::Serve { .. } => {
            unreachable!("Serve handled separately");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = ServiceConfig {
        storage_root: cli.storage_root,
        similarity_threshold: cli.threshold,
        default_top_k: cli.top_k,
        dimension: cli.dimension,
    };
    let service = BudgetService::open(config).context("opening budget index")?;

    match cli.command {
        Commands::Serve { addr } => budget_index::server::start(&addr, Arc::new(service)).await,
        command => run(&service, command),
    }
}
