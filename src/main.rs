mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bookvec::config::BookvecConfig;

#[derive(Parser)]
#[command(name = "bookvec", version, about = "Store EPUB books as sentences and embed them")]
struct Cli {
    /// Database file (overrides config and BOOKVEC_DB)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Config file (default: ~/.bookvec/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema and run migrations
    InitDb,
    /// Split an EPUB into chapters and sentences and store it
    StoreEbook {
        /// Path to the .epub file
        #[arg(long)]
        epub_path: PathBuf,
        /// Unique name to store the book under
        #[arg(long)]
        symbolic_name: String,
    },
    /// Compute embeddings for every sentence that has none
    CalcEmbeddings {
        /// Neighbouring sentences on each side included in the embedded text
        #[arg(long)]
        context_window: Option<usize>,
        /// Worker threads (default: half the CPUs)
        #[arg(long)]
        workers: Option<usize>,
        /// Capacity of the queue between workers and the writer
        #[arg(long)]
        queue_capacity: Option<usize>,
    },
    /// Find the sentences most similar to a query
    Query {
        text: String,
        #[arg(long, default_value_t = 10)]
        n_results: usize,
    },
    /// Show library statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BookvecConfig::load_from(path)?,
        None => BookvecConfig::load()?,
    };
    if let Some(db_path) = &cli.db_path {
        config.storage.db_path = db_path.to_string_lossy().into_owned();
    }

    // Log to stderr so command output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::InitDb => cli::init_db::init_db(&config)?,
        Command::StoreEbook {
            epub_path,
            symbolic_name,
        } => cli::store_ebook::store_ebook(&config, &epub_path, &symbolic_name)?,
        Command::CalcEmbeddings {
            context_window,
            workers,
            queue_capacity,
        } => {
            if let Some(n) = context_window {
                config.pipeline.context_window = n;
            }
            if let Some(n) = workers {
                config.pipeline.workers = n;
            }
            if let Some(n) = queue_capacity {
                config.pipeline.queue_capacity = n;
            }
            cli::calc_embeddings::calc_embeddings(&config)?;
        }
        Command::Query { text, n_results } => cli::query::query(&config, &text, n_results)?,
        Command::Stats => cli::stats::stats(&config)?,
    }

    Ok(())
}
