//! Shelf-Harvest main entry point
//!
//! This is the command-line interface for the Shelf-Harvest catalog harvester.

use anyhow::Context;
use clap::Parser;
use shelf_harvest::config::{load_config_with_hash, Config, LoggingConfig};
use shelf_harvest::notify::{NoopNotifier, Notifier, SmtpNotifier};
use shelf_harvest::state::{CheckpointStore, FileCheckpointStore};
use shelf_harvest::storage::{open_sink, BackendKind};
use shelf_harvest::{SyncLoop, SyncOutcome};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Exit status after an operator interrupt
const EXIT_INTERRUPTED: i32 = 130;

/// Shelf-Harvest: a resumable product catalog harvester
///
/// Walks every page of a product listing, follows each product to its
/// detail page and upserts it into SQLite, JSONL or XLSX storage. Progress
/// is checkpointed after every product.
#[derive(Parser, Debug)]
#[command(name = "shelf-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable product catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv); logs go to stdout
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard the saved checkpoint and start from the first page
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;

    if cli.dry_run {
        print_dry_run(&config, &cli.config, &config_hash);
        return Ok(());
    }

    let guard = setup_logging(&config.logging, cli.verbose, cli.quiet)?;
    tracing::info!(
        "Configuration {} loaded (hash: {})",
        cli.config.display(),
        config_hash
    );

    let outcome = harvest(config, cli.fresh).await;
    drop(guard);

    match outcome? {
        SyncOutcome::Completed(_) => Ok(()),
        SyncOutcome::Cancelled(_) => std::process::exit(EXIT_INTERRUPTED),
    }
}

/// Sets up the tracing subscriber
///
/// Debug-level output (from the config or `-v`) goes to stdout; any other
/// level goes to a daily rolling file under the configured logs directory.
fn setup_logging(
    logging: &LoggingConfig,
    verbose: u8,
    quiet: bool,
) -> anyhow::Result<Option<WorkerGuard>> {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => normalize_level(&logging.level),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };
    let filter = EnvFilter::new(format!("shelf_harvest={},warn", level));

    if level == "debug" || level == "trace" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stdout)
            .init();
        return Ok(None);
    }

    std::fs::create_dir_all(&logging.logs_dir)
        .with_context(|| format!("Cannot create logs directory {}", logging.logs_dir))?;
    let appender = tracing_appender::rolling::daily(&logging.logs_dir, "harvest.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(Some(guard))
}

fn normalize_level(level: &str) -> String {
    match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        other => other.to_string(),
    }
}

/// Opens storage, installs the interrupt handler and runs the sync loop
async fn harvest(config: Config, fresh: bool) -> anyhow::Result<SyncOutcome> {
    if fresh {
        tracing::info!("Starting fresh harvest (discarding saved checkpoint)");
        FileCheckpointStore::new(&config.scraper.state_file).clear()?;
    }

    let sink = open_sink(Path::new(&config.database.file_path)).map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;

    let cancel = CancellationToken::new();
    tokio::spawn(watch_interrupts(cancel.clone()));

    let outcome = match &config.mail {
        Some(mail) => {
            let notifier = SmtpNotifier::from_config(mail)?;
            run(&config, sink, notifier, cancel).await?
        }
        None => run(&config, sink, NoopNotifier, cancel).await?,
    };

    if let SyncOutcome::Completed(stats) = &outcome {
        tracing::info!("Harvest finished\n{}", stats.summary());
    }
    Ok(outcome)
}

/// Cancels `cancel` on the first Ctrl-C and exits on the second
async fn watch_interrupts(cancel: CancellationToken) {
    let mut received = 0u32;
    while tokio::signal::ctrl_c().await.is_ok() {
        received += 1;
        if handle_interrupt(received, &cancel) {
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}

/// Returns `true` when the process must exit right away
fn handle_interrupt(received: u32, cancel: &CancellationToken) -> bool {
    if received == 1 {
        tracing::warn!("Interrupt received, stopping after the current item");
        cancel.cancel();
        false
    } else {
        tracing::error!("Second interrupt received, exiting immediately");
        true
    }
}

async fn run<N: Notifier>(
    config: &Config,
    sink: Box<dyn shelf_harvest::storage::UpsertSink>,
    notifier: N,
    cancel: CancellationToken,
) -> shelf_harvest::Result<SyncOutcome> {
    Ok(SyncLoop::from_config(config, sink, notifier, cancel)?
        .run()
        .await)
}

/// Handles the --dry-run mode: prints the resolved configuration
fn print_dry_run(config: &Config, path: &Path, hash: &str) {
    println!("=== Shelf-Harvest Dry Run ===\n");
    println!("Configuration: {} (hash: {})", path.display(), hash);

    println!("\nScraper:");
    println!("  Listing: {}", config.scraper.url);
    println!("  Page query: {}", config.scraper.page_query);
    println!("  Checkpoint: {}", config.scraper.state_file);
    println!("  Restart delay: {}s", config.scraper.restart_delay_secs);

    let fetcher = &config.scraper.fetcher;
    println!("\nFetcher:");
    println!("  Attempts per URL: {}", fetcher.max_attempts);
    println!("  Retry delay: {}ms", fetcher.retry_delay_ms);
    println!("  Request delay: {}ms", fetcher.request_delay_ms);
    println!("  Timeout: {}s", fetcher.timeout_secs);
    for (name, value) in &fetcher.headers {
        println!("  {}: {}", name, value);
    }

    let checkpoint = FileCheckpointStore::new(&config.scraper.state_file).load();
    println!("\nResume point: {}", checkpoint);

    println!("\nStorage:");
    println!("  File: {}", config.database.file_path);
    if let Ok(kind) = BackendKind::from_path(Path::new(&config.database.file_path)) {
        println!("  Backend: {}", kind);
    }
    println!("  Identity key: {}", config.database.identity_key.join(", "));

    match &config.mail {
        Some(mail) => println!("\nNotifications: {} via {}", mail.recipients, mail.smtp_server),
        None => println!("\nNotifications: disabled"),
    }

    println!("\n✓ Configuration is valid");
}
