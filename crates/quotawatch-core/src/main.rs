//! quotawatch CLI
//!
//! Command-line interface for session quota notifications.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use quotawatch::alerting::{
    FileStateStore, MemoryStateStore, NotificationDispatcher, QuotaEvaluator, StateStore,
};
use quotawatch::models::{QuotaState, UsageProvider};
use quotawatch::monitor::{QuotaMonitor, SnapshotFileSource};
use quotawatch::replay::{replay, ReplayStep};
use quotawatch::Config;

/// quotawatch - session quota notifications for AI assistants
#[derive(Parser)]
#[command(name = "quotawatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "QUOTAWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a usage snapshot file and send notifications
    Watch {
        /// Provider the snapshot belongs to
        #[arg(long, default_value = "claude")]
        provider: UsageProvider,

        /// JSON observation file, rewritten by the usage fetcher
        #[arg(long)]
        snapshot: PathBuf,

        /// State file (defaults to the per-user data directory)
        #[arg(long, env = "QUOTAWATCH_STATE")]
        state: Option<PathBuf>,
    },

    /// Replay recorded observations and print the notifications they produce
    Replay {
        /// Provider the observations belong to
        #[arg(long, default_value = "claude")]
        provider: UsageProvider,

        /// JSON array of {"at": ..., "observation": {...}}
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_logging(&config, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Watch {
            provider,
            snapshot,
            state,
        } => run_watch(config, provider, snapshot, state).await,
        Commands::Replay { provider, file } => run_replay(&config, provider, &file, cli.format).await,
        Commands::Config => run_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let log_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if config.logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_watch(
    config: Config,
    provider: UsageProvider,
    snapshot: PathBuf,
    state: Option<PathBuf>,
) -> anyhow::Result<()> {
    let dispatcher = NotificationDispatcher::from_config(&config.delivery)
        .context("building notification sinks")?;
    if dispatcher.sink_count() == 0 {
        warn!("No notification sinks configured");
    }

    let store: Arc<dyn StateStore> = match state.or_else(|| config.state_path()) {
        Some(path) => {
            info!(path = %path.display(), "Using state file");
            Arc::new(FileStateStore::new(path))
        }
        None => {
            warn!("No data directory available; quota state will not survive restarts");
            Arc::new(MemoryStateStore::new())
        }
    };

    let source = SnapshotFileSource::new(provider, snapshot);
    let monitor = QuotaMonitor::from_config(&config, source, dispatcher, store);

    monitor
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}

async fn run_replay(
    config: &Config,
    provider: UsageProvider,
    file: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let steps: Vec<ReplayStep> =
        serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", file.display()))?;

    let evaluator = QuotaEvaluator::from_config(config);
    let (records, state) = replay(&evaluator, provider, QuotaState::default(), &steps);

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "records": records, "final_state": state });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for record in &records {
                for notification in &record.notifications {
                    println!(
                        "{}  [{}] {}: {}",
                        record.at.to_rfc3339(),
                        notification.id,
                        notification.title,
                        notification.body
                    );
                }
            }
            println!();
            println!(
                "{} observation(s), {} notification(s)",
                records.len(),
                records.iter().map(|r| r.notifications.len()).sum::<usize>()
            );
        }
    }

    Ok(())
}

fn run_config(config: &Config) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if let Some(path) = config.state_path() {
        println!();
        println!("State file: {}", path.display());
    }
    Ok(())
}
