//! JapanHouse ingest main entry point
//!
//! This is the command-line interface for the property-listing ingestion
//! pipeline.

use anyhow::Context;
use clap::Parser;
use japanhouse_ingest::config::{load_config_with_hash, Config};
use japanhouse_ingest::crawler::build_http_client;
use japanhouse_ingest::ingest::{print_summary, Orchestrator, RunOptions};
use japanhouse_ingest::storage::{ListingStore, SqliteStorage};
use japanhouse_ingest::translate::HttpTranslator;
use japanhouse_ingest::{available_adapters, PropertyType};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// JapanHouse ingest: multi-source property-listing ingestion
///
/// Crawls listing pages of Japanese real-estate sites, normalizes them into
/// one schema and upserts them into a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "japanhouse-ingest")]
#[command(version = "1.0.0")]
#[command(about = "Multi-source property-listing ingestion", long_about = None)]
struct Cli {
    /// Comma-separated adapter names (default: all)
    #[arg(long, value_delimiter = ',')]
    scrapers: Vec<String>,

    /// Search location (e.g. tokyo, osaka, kanagawa)
    #[arg(long, default_value = "tokyo")]
    location: String,

    /// Listing category to crawl
    #[arg(long, value_enum, default_value_t = PropertyType::Rent)]
    property_type: PropertyType,

    /// Listing pages to crawl per adapter
    #[arg(long, default_value_t = 5)]
    max_pages: u32,

    /// Stop an adapter after this many unique listings
    #[arg(long)]
    max_listings: Option<usize>,

    /// Reconcile with stored rows instead of appending history rows
    #[arg(long)]
    update_mode: bool,

    /// Fetch each listing's detail page
    #[arg(long)]
    detail_pages: bool,

    /// Skip listings without enough usable images
    #[arg(long)]
    enforce_image_quality: bool,

    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Database path (overrides the configuration file)
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Cancel the whole run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print the registered adapters and exit
    #[arg(long, conflicts_with = "stats")]
    list_scrapers: bool,

    /// Show row counts from the database and exit
    #[arg(long, conflicts_with = "list_scrapers")]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if cli.list_scrapers {
        for name in available_adapters() {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }

    let (config, config_hash) = match load(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::from(2);
        }
    };

    if cli.stats {
        return match handle_stats(&config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("{:#}", e);
                ExitCode::from(2)
            }
        };
    }

    let orchestrator = match build_orchestrator(config, config_hash) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::from(2);
        }
    };

    let options = RunOptions {
        scrapers: cli.scrapers.clone(),
        location: cli.location.clone(),
        property_type: cli.property_type,
        max_pages: cli.max_pages,
        max_listings: cli.max_listings,
        update_mode: cli.update_mode,
        detail_pages: cli.detail_pages,
        enforce_image_quality: cli.enforce_image_quality,
    };

    let cancel = CancellationToken::new();
    spawn_cancellation(cancel.clone(), cli.timeout_secs);

    match orchestrator.run(&options, cancel).await {
        Ok(summary) => {
            print_summary(&summary);
            if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            tracing::error!("Ingest run could not start: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("japanhouse_ingest=info,warn"),
            1 => EnvFilter::new("japanhouse_ingest=debug,info"),
            2 => EnvFilter::new("japanhouse_ingest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or defaults when none is given
fn load(cli: &Cli) -> anyhow::Result<(Config, String)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => (Config::default(), "defaults".to_string()),
    };

    if let Some(database) = &cli.database {
        config.output.database_path = database.to_string_lossy().into_owned();
    }
    Ok((config, hash))
}

fn build_orchestrator(config: Config, config_hash: String) -> anyhow::Result<Orchestrator> {
    let translation = config.translation.clone();
    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
    let user_agent = config.user_agent.clone();

    let mut orchestrator = Orchestrator::new(config, config_hash)
        .context("failed to open the listing database")?;

    if let Some(translation) = translation {
        tracing::info!("Translating listings via {}", translation.endpoint);
        let client = build_http_client(&user_agent, timeout)?;
        let translator = HttpTranslator::new(client, &translation)?;
        orchestrator = orchestrator.with_translator(Arc::new(translator));
    }
    Ok(orchestrator)
}

/// Cancels the run on Ctrl-C or when the run deadline passes
fn spawn_cancellation(cancel: CancellationToken, timeout_secs: Option<u64>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight writes");
            on_signal.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::warn!("Run deadline of {}s reached, cancelling", secs);
                    cancel.cancel();
                }
            }
        });
    }
}

/// Handles the --stats mode: shows row counts from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    println!("Listing rows: {}", storage.count_listings()?);
    let mut by_source: Vec<_> = storage.count_listings_by_source()?.into_iter().collect();
    by_source.sort();
    for (source, count) in by_source {
        println!("  {}: {}", source, count);
    }

    if let Some(run) = storage.get_latest_run()? {
        println!(
            "\nLatest run: #{} started {} ({})",
            run.id,
            run.started_at,
            run.status.to_db_string()
        );
    }

    Ok(())
}
