mod browser;
mod resolve;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "maplink")]
#[command(about = "Resolve shared map links to coordinates and Waze links")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve one or more map links and print a Waze link for each
    Resolve {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Maximum number of links resolved at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Locale hint for consent pages and `Accept-Language` (e.g. `pt-PT`)
        #[arg(long)]
        locale: Option<String>,

        /// Print one JSON object per link instead of reply text
        #[arg(long)]
        json: bool,
    },
    /// Answer a chat message the way the messaging bot would
    Reply {
        text: String,

        #[arg(long)]
        locale: Option<String>,
    },
    /// Launch the headless browser once and report whether rendering works
    CheckBrowser,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = maplink_core::load_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Resolve {
            urls,
            concurrency,
            locale,
            json,
        } => resolve::run_resolve(&config, &urls, concurrency, locale.as_deref(), json).await,
        Commands::Reply { text, locale } => {
            resolve::run_reply(&config, &text, locale.as_deref()).await
        }
        Commands::CheckBrowser => browser::run_check(&config).await,
    }
}
