//! Topic-Harvester main entry point
//!
//! This is the command-line interface for the Topic-Harvester page harvester.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use topic_harvester::config::{load_config_with_hash, Config};
use topic_harvester::crawler::Harvester;
use topic_harvester::output::{print_summary, JsonFileSink, RecordSink};
use tracing_subscriber::EnvFilter;

/// Topic-Harvester: a bounded-concurrency topic page harvester
///
/// Topic-Harvester fetches the configured seed pages, follows links related
/// to each seed's topic, and writes title, description and body text of every
/// harvested page to a JSON file.
#[derive(Parser, Debug)]
#[command(name = "topic-harvester")]
#[command(version)]
#[command(about = "A bounded-concurrency topic page harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching
    #[arg(long)]
    dry_run: bool,

    /// Write records here instead of the configured json-path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Cancel the run after this many seconds, keeping partial results
    #[arg(long, value_name = "SECS")]
    deadline: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(&config.output.json_path));

    handle_harvest(&config, output, cli.deadline, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("topic_harvester=info,warn"),
            1 => EnvFilter::new("topic_harvester=debug,info"),
            2 => EnvFilter::new("topic_harvester=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) {
    println!("=== Topic-Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Request timeout: {}ms", config.crawler.request_timeout);
    println!(
        "  Retry: {} attempts, backoff {}ms..{}ms{}",
        config.crawler.max_attempts,
        config.crawler.base_delay,
        config.crawler.max_delay,
        if config.crawler.jitter { " with jitter" } else { "" }
    );
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Relevance: {:?}", config.crawler.relevance);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  JSON: {}", config.output.json_path);

    println!("\nTargets ({}):", config.targets.len());
    for target in &config.targets {
        println!("  - {} [{}]", target.url, target.topic);
    }

    println!("\nBlacklisted Domains ({}):", config.blacklist.len());
    for entry in &config.blacklist {
        println!("  - {}", entry.domain);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start harvesting with {} seed URLs",
        config.targets.len()
    );
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: &Config,
    output: PathBuf,
    deadline: Option<u64>,
    quiet: bool,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    spawn_cancel_triggers(cancel.clone(), deadline);

    let harvester = Harvester::new(config).context("failed to initialize harvester")?;
    let report = harvester
        .harvest(config, cancel.clone())
        .await
        .context("harvest failed")?;
    // Stop the trigger tasks once the run is over
    cancel.cancel();

    let sink = JsonFileSink::new(&output);
    sink.write(&report.records, &report.summary)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if !quiet {
        println!();
        print_summary(&report.summary);
        println!("\n✓ Records written to: {}", output.display());
    }

    Ok(())
}

/// Cancels the run on Ctrl-C or when the deadline passes
fn spawn_cancel_triggers(cancel: CancellationToken, deadline: Option<u64>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => tracing::warn!("Interrupt received, finishing in-flight requests"),
                    Err(e) => {
                        tracing::error!("Failed to listen for Ctrl-C: {}", e);
                        return;
                    }
                }
                on_signal.cancel();
            }
            _ = on_signal.cancelled() => {}
        }
    });

    if let Some(secs) = deadline {
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::warn!("Deadline of {}s reached, cancelling run", secs);
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        });
    }
}
