/*!
 * Hookguard CLI - Command Line Interface
 *
 * Author: Shane Wall <shaneawall@gmail.com>
 */

use anyhow::Context;
use clap::{Parser, Subcommand};
use hookguard::{
    config::{GuardConfig, CONFIG_FILE_NAME},
    error::{GuardError, EXIT_FAILURE, EXIT_SUCCESS},
    events::GuardEvent,
    lifecycle::LifecycleEvent,
    logging,
    sentinel::{NotificationSink, RefreshOutcome, RefreshRequest, TracingSink},
    Guard,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "hookguard")]
#[command(version, about = "Self-healing resilience core for repository guard hooks", long_about = None)]
struct Cli {
    /// Configuration file (default: <repo>/hookguard.toml if present)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Repository root
    #[arg(short = 'r', long = "repo", default_value = ".", global = true)]
    repo: PathBuf,

    /// Verbose output (debug level)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the guard until interrupted
    Run {
        /// How often queued notifications are flushed, in milliseconds
        #[arg(long, default_value = "1000")]
        flush_interval_ms: u64,
    },

    /// Print lifecycle, evidence, heartbeat and breaker status as JSON
    Status,

    /// Refresh the evidence artifact now
    Refresh {
        /// Reason recorded with the refresh
        #[arg(long, default_value = "manual")]
        reason: String,

        /// Platforms to refresh (comma separated, overrides configuration)
        #[arg(long, value_delimiter = ',')]
        platforms: Option<Vec<String>>,
    },

    /// Apply a lifecycle event (start, block, unblock, degrade, recover, recovered, stop, reset)
    Transition { event: LifecycleEvent },

    /// Publish a domain event given as JSON, e.g. '{"type":"commit-blocked","reason":"lint","violations":2}'
    Emit { event: String },

    /// Evaluate the heartbeat file once
    Heartbeat,

    /// Write a configuration file with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<GuardError>()
                .map(GuardError::exit_code)
                .unwrap_or(EXIT_FAILURE)
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        return init_config(&cli, force);
    }

    let mut config = match cli.config {
        Some(ref path) => GuardConfig::from_file(path)?,
        None => GuardConfig::discover(&cli.repo)?,
    };
    config.logging.verbose |= cli.verbose;

    let logging_config = config.clone().resolve_paths(&cli.repo).logging;
    if let Err(e) = logging::init_logging(&logging_config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let guard = Guard::builder(config, cli.repo.clone()).build().await?;

    match cli.command {
        Commands::Run { flush_interval_ms } => run_guard(&guard, flush_interval_ms).await,
        Commands::Status => print_json(&guard.status().await),
        Commands::Refresh { reason, platforms } => {
            let mut request = RefreshRequest::new(reason);
            if let Some(platforms) = platforms {
                request = request.with_platforms(platforms);
            }
            let outcome = guard.refresh(request).await?;
            flush(&guard);
            match outcome {
                RefreshOutcome::Refreshed => println!("✅ Evidence refreshed"),
                RefreshOutcome::Skipped { .. } => println!("⏭️  Refresh already in progress"),
            }
            Ok(())
        }
        Commands::Transition { event } => {
            let transition = guard.transition(event).await?;
            println!("{} --{}--> {}", transition.from, transition.event, transition.to);
            Ok(())
        }
        Commands::Emit { event } => {
            let payload: GuardEvent =
                serde_json::from_str(&event).context("event must be a JSON domain event")?;
            let published = guard.publish(payload).await?;
            flush(&guard);
            println!("{}", published.id());
            println!("state: {}", guard.state().await);
            Ok(())
        }
        Commands::Heartbeat => print_json(&guard.check_heartbeat().await),
        Commands::Init { .. } => Ok(()),
    }
}

async fn run_guard(guard: &Guard, flush_interval_ms: u64) -> anyhow::Result<()> {
    guard.start().await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(Duration::from_millis(flush_interval_ms.max(1)));

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("failed to listen for ctrl-c")?;
                break;
            }
            _ = ticker.tick() => flush(guard),
        }
    }

    info!("Shutdown requested");
    guard.shutdown().await?;
    flush(guard);

    let status = guard.status().await;
    info!("📊 {}", status.recovery.summary());
    info!(
        "📊 Bus: {} published | {} duplicates | {} failed",
        status.bus.published, status.bus.duplicates, status.bus.failed
    );
    Ok(())
}

fn flush(guard: &Guard) {
    let sink = TracingSink;
    for notification in guard.drain_notifications() {
        sink.enqueue(notification);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_config(cli: &Cli, force: bool) -> anyhow::Result<()> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.repo.join(CONFIG_FILE_NAME));
    if path.exists() && !force {
        return Err(GuardError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ))
        .into());
    }
    GuardConfig::default().save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
