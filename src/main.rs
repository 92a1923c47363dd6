//! riscos-spider main entry point
//!
//! Command-line interface for the RISC OS ecosystem spider.

use anyhow::{bail, Context};
use clap::Parser;
use riscos_spider::config::{load_config_with_hash, Config};
use riscos_spider::crawler::StepOutcome;
use riscos_spider::sync::{self, SyncState};
use riscos_spider::Spider;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// riscos-spider: a self-directed crawler for the RISC OS software ecosystem
///
/// Without a mode flag the spider seeds its queue and then crawls forever,
/// interleaving housekeeping passes during the configured hours.
#[derive(Parser, Debug)]
#[command(name = "riscos-spider")]
#[command(version)]
#[command(about = "A crawler for the RISC OS software ecosystem", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "riscos-spider.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a single crawl step and exit
    #[arg(long, conflicts_with_all = ["steps", "housekeep", "serve_sync", "stats"])]
    once: bool,

    /// Run this many crawl steps and exit
    #[arg(long, value_name = "N", conflicts_with_all = ["housekeep", "serve_sync", "stats"])]
    steps: Option<usize>,

    /// Run one housekeeping pass and exit
    #[arg(long, conflicts_with_all = ["serve_sync", "stats"])]
    housekeep: bool,

    /// Only serve the synchronisation endpoint
    #[arg(long, conflicts_with = "stats")]
    serve_sync: bool,

    /// Print per-store record counts and exit
    #[arg(long)]
    stats: bool,

    /// Extra seed URLs to queue before crawling
    #[arg(long, value_name = "URL", num_args = 1..)]
    seed: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::info!("Configuration loaded (hash: {})", hash);

    let mut spider = Spider::new(config).context("opening the catalog database")?;

    if cli.stats {
        return handle_stats(&spider);
    }
    if cli.serve_sync {
        let Some(listen) = spider.config().sync.listen.clone() else {
            bail!("--serve-sync needs [sync] listen in the configuration");
        };
        return serve_sync(&spider, &listen).await;
    }

    spider.seed(&cli.seed)?;

    if cli.housekeep {
        match spider.housekeep().await? {
            Some(report) => println!("{}: {} affected", report.task, report.affected),
            None => println!("No housekeeping task due"),
        }
        return Ok(());
    }

    let steps = if cli.once { Some(1) } else { cli.steps };
    if let Some(steps) = steps {
        for outcome in spider.run_steps(steps).await? {
            print_outcome(&outcome);
        }
        return Ok(());
    }

    handle_crawl(spider).await
}

/// Sets up the tracing subscriber; `RUST_LOG` overrides the verbosity flags
fn setup_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "riscos_spider=info,warn",
            1 => "riscos_spider=debug,info",
            _ => "riscos_spider=trace,debug",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn handle_stats(spider: &Spider) -> anyhow::Result<()> {
    println!("Database: {}\n", spider.config().output.database_path);
    for (store, count) in spider.stats()? {
        println!("  {:<10} {:>8}", store.to_string(), count);
    }
    Ok(())
}

fn sync_state(spider: &Spider, config: &Config) -> Arc<SyncState> {
    Arc::new(SyncState::new(spider.storage(), config.sync.allow.clone()))
}

async fn serve_sync(spider: &Spider, listen: &str) -> anyhow::Result<()> {
    let state = sync_state(spider, spider.config());
    sync::serve(listen, state).await?;
    Ok(())
}

async fn handle_crawl(mut spider: Spider) -> anyhow::Result<()> {
    if let Some(listen) = spider.config().sync.listen.clone() {
        let state = sync_state(&spider, spider.config());
        tokio::spawn(async move {
            if let Err(e) = sync::serve(&listen, state).await {
                tracing::error!("Synchronisation endpoint stopped: {}", e);
            }
        });
    }

    let counts = spider.stats()?;
    tracing::info!("Starting crawl; stores {:?}", counts);

    spider.run_continuous().await.context("crawl stopped")?;
    Ok(())
}

fn print_outcome(outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Idle => println!("idle: nothing pending"),
        StepOutcome::Catalogued {
            url,
            kind,
            records,
            queued,
        } => println!("catalogued {} ({}, {} records, {} links queued)", url, kind, records, queued),
        StepOutcome::Rejected { url, reason } => println!("rejected {} ({})", url, reason),
        StepOutcome::Reserved { url, moved } => println!("reserved {} ({} moved)", url, moved),
        StepOutcome::Dropped { url, removed } => println!("dropped {} ({} removed)", url, removed),
        StepOutcome::Struck { url, strikes } => println!("struck {} ({} strikes)", url, strikes),
        StepOutcome::Transient { url, error } => println!("retry later {} ({})", url, error),
    }
}
