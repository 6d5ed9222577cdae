use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paper_scout::config::{LogFormat, LoggingConfig};
use paper_scout::{Config, MetaSearchClient, SearchRequest, SourceId};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Search several academic indexes at once and get one ranked, deduplicated list
#[derive(Parser, Debug)]
#[command(name = "paper-scout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Log filter directive, e.g. "debug" or "paper_scout=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search every enabled source and print the result as JSON
    #[command(alias = "s")]
    Search {
        /// Free-text query
        query: String,

        /// Records requested from each source
        #[arg(long, short, allow_negative_numbers = true)]
        limit: Option<i64>,

        /// Comma-separated sources, e.g. crossref,openalex,arxiv
        #[arg(long, short, value_delimiter = ',')]
        sources: Vec<SourceId>,

        /// Single-line JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// Print the effective configuration as TOML (secrets hidden)
    Config,
}

fn init_tracing(logging: &LoggingConfig, level: Option<&str>, json: bool) {
    // An explicit --log-level beats RUST_LOG, which beats the config file
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&logging.level)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json || logging.format == LogFormat::Json {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }
}

/// Cancel `token` on the first Ctrl-C so the search returns what it has.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, returning partial results");
            token.cancel();
        }
    });
}

async fn search(
    config: &Config,
    query: String,
    limit: Option<i64>,
    sources: Vec<SourceId>,
    compact: bool,
) -> Result<()> {
    let limit = limit.unwrap_or_else(|| i64::from(config.search.default_limit));
    let sources = if sources.is_empty() {
        config.search.default_sources.clone()
    } else {
        sources
    };
    let request = SearchRequest::new(query, limit, &sources);

    let client = MetaSearchClient::new(config).context("failed to build search client")?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let result = client.search(&request, &cancel).await?;
    info!(
        "{} works from {} sources",
        result.papers.len(),
        result.diagnostics.len()
    );

    let output = if compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{output}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging, cli.log_level.as_deref(), cli.json_logs);

    match cli.command {
        Commands::Search {
            query,
            limit,
            sources,
            compact,
        } => search(&config, query, limit, sources, compact).await?,
        Commands::Config => println!("{}", config.redacted().to_toml()?),
    }

    Ok(())
}
