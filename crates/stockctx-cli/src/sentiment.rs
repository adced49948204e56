//! Sentiment command handlers for the CLI.

use clap::Subcommand;

use crate::context::Services;
use crate::index::print_json;

/// Sub-commands available under `sentiment`.
#[derive(Debug, Subcommand)]
pub enum SentimentCommands {
    /// Collect, score, and store fresh posts, then aggregate them
    Analyze {
        #[arg(long)]
        ticker: String,
    },
    /// Aggregate the posts already stored for a ticker
    Summary {
        #[arg(long)]
        ticker: String,
    },
}

pub(crate) async fn run(services: &Services, command: SentimentCommands) -> anyhow::Result<()> {
    let service = services.sentiment()?;
    match command {
        SentimentCommands::Analyze { ticker } => {
            let report = service.analyze_ticker(&ticker).await;
            print_json(&report)
        }
        SentimentCommands::Summary { ticker } => {
            let summary = service.summary(&ticker).await?;
            print_json(&summary)
        }
    }
}
