//! policy-worker: runs the policy scheduler behind the notification bus.
//!
//! Startup replays the JSON configuration through the config watcher so the
//! scan-all policy is programmed before the first change arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use dockyard_core::config::{load_dotenv, Config};
use dockyard_notifier::{load_configuration, register_default_handlers, NotificationBus, NotifierConfig};
use dockyard_scheduler::{ImageScanner, Scheduler, SchedulerConfig, TaskError};

// ── CLI ─────────────────────────────────────────────────────────────

/// Policy worker: scheduler daemon plus configuration-driven scan policy.
#[derive(Parser, Debug)]
#[command(name = "policy-worker", version, about)]
struct Cli {
    /// JSON configuration replayed at startup. Overrides POLICY_CONFIG_PATH.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration profile (e.g. PROD). Overrides DOCKYARD_PROFILE.
    #[arg(long)]
    profile: Option<String>,
}

// ── Scanner ─────────────────────────────────────────────────────────

/// Stands in for the registry's scan service, which runs out of process.
struct LoggingScanner;

impl ImageScanner for LoggingScanner {
    fn scan_all(&self) -> Result<(), TaskError> {
        info!("scan of all images requested");
        Ok(())
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let config = match &cli.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    config.validate()?;
    config.log_summary();

    let scheduler = Scheduler::new(SchedulerConfig::from(&config.scheduler))?;
    scheduler.start();

    let bus = Arc::new(NotificationBus::new(NotifierConfig::from(&config.notifier)));
    register_default_handlers(&bus, scheduler.clone(), Arc::new(LoggingScanner))?;

    let path = cli.config.unwrap_or_else(|| config.policy.config_path.clone());
    match load_configuration(&bus, &path).await {
        Ok(()) => info!(path = %path.display(), "configuration replayed"),
        Err(e) if e.is_no_handlers() => info!(path = %path.display(), "no handler for configuration"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to replay configuration"),
    }

    info!("policy-worker running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    scheduler.stop().await;
    bus.shutdown().await;
    info!("policy-worker stopped");
    Ok(())
}
