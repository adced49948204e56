mod context;
mod index;
mod sentiment;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::context::Services;
use crate::sentiment::SentimentCommands;

#[derive(Debug, Parser)]
#[command(name = "stockctx")]
#[command(about = "Stock ticker context: vector index, retrieval, and sentiment")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show vector and record counts for the local index
    Stats,
    /// Retrieve the stored documents most similar to a query
    Search {
        /// Free-text query to embed
        #[arg(long)]
        query: String,
        /// Namespace to search in
        #[arg(long, default_value = "news")]
        namespace: String,
        /// Only return documents for this ticker
        #[arg(long)]
        ticker: Option<String>,
        /// Only return documents of this type
        #[arg(long)]
        doc_type: Option<String>,
        /// Number of results (defaults to `RAG_TOP_K`)
        #[arg(long)]
        k: Option<usize>,
    },
    /// Embed and store documents from a JSON-lines file, one draft per line
    Ingest {
        #[arg(long)]
        file: std::path::PathBuf,
    },
    /// Fetch, embed, and store news articles listed in a JSON file
    Articles {
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        file: std::path::PathBuf,
    },
    /// Remove every stored document for a ticker
    Purge {
        #[arg(long)]
        ticker: String,
        /// Restrict the purge to one namespace
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Social sentiment analysis
    Sentiment {
        #[command(subcommand)]
        command: SentimentCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = stockctx_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command else {
        println!("stockctx: no command given, see --help");
        return Ok(());
    };

    let services = Services::open(config)?;
    match command {
        Commands::Stats => index::run_stats(&services),
        Commands::Search {
            query,
            namespace,
            ticker,
            doc_type,
            k,
        } => {
            let filter = index::search_filter(namespace, ticker, doc_type);
            index::run_search(&services, &query, &filter, k).await
        }
        Commands::Ingest { file } => index::run_ingest(&services, &file).await,
        Commands::Articles { ticker, file } => {
            index::run_articles(&services, &ticker, &file).await
        }
        Commands::Purge { ticker, namespace } => {
            index::run_purge(&services, &ticker, namespace.as_deref())
        }
        Commands::Sentiment { command } => sentiment::run(&services, command).await,
    }
}

#[cfg(test)]
mod tests;
