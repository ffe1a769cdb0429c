//! relay-sentinel: notification-relay watchdog
//!
//! # Usage
//!
//! ```bash
//! # Run the supervisor against the simulated platform
//! relay-sentinel run --vendor xiaomi
//!
//! # Start as if the device just booted
//! relay-sentinel run --boot
//!
//! # Inspect the persisted health record
//! relay-sentinel status
//!
//! # One on-demand recovery attempt
//! relay-sentinel recover --strategy deep-reset
//! ```
//!
//! # Environment Variables
//!
//! - `SENTINEL_CONFIG`: path to the TOML configuration file
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use relay_sentinel::background::{
    HealthMonitor, RecoveryManager, StartReason, Supervisor, SupervisorDeps,
};
use relay_sentinel::clock::{Clock, SystemClock};
use relay_sentinel::config::SentinelConfig;
use relay_sentinel::connection::LoopbackTransport;
use relay_sentinel::platform::{SimulatedPlatform, TracingAlertSink};
use relay_sentinel::policy::ManufacturerProfile;
use relay_sentinel::storage::{HeartbeatStore, SledStore};
use relay_sentinel::types::RecoveryStrategy;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "relay-sentinel")]
#[command(about = "Health monitoring and recovery for the notification relay worker")]
#[command(version)]
struct CliArgs {
    /// Configuration file (overrides the SENTINEL_CONFIG / ./sentinel.toml search)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Device manufacturer string, e.g. "Xiaomi" or "samsung"
    #[arg(long, global = true)]
    vendor: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the supervisor until Ctrl-C
    Run {
        /// Treat this start as a device boot
        #[arg(long)]
        boot: bool,
    },

    /// Print health metrics as JSON
    Status,

    /// Mark the worker as intentionally stopped
    Stop,

    /// Run one recovery attempt now
    Recover {
        /// soft-restart, force-restart, deep-reset or vendor-specific
        /// (default: next rung of the escalation ladder)
        #[arg(long)]
        strategy: Option<RecoveryStrategy>,
    },

    /// Print the tuning profile for a manufacturer
    Profile {
        /// Manufacturer string (default: configured vendor)
        manufacturer: Option<String>,
    },
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(args: &CliArgs) -> Result<SentinelConfig> {
    let mut config = match &args.config {
        Some(path) => SentinelConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SentinelConfig::load(),
    };
    if let Some(vendor) = &args.vendor {
        config.device.vendor.clone_from(vendor);
    }
    Ok(config)
}

fn open_store(config: &SentinelConfig) -> Result<HeartbeatStore> {
    let path = &config.storage.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let kv = SledStore::open(path).with_context(|| {
        format!(
            "Failed to open heartbeat store at {} (is another relay-sentinel running?)",
            path.display()
        )
    })?;
    Ok(HeartbeatStore::new(Arc::new(kv)))
}

// ============================================================================
// Subcommands
// ============================================================================

async fn run(config: SentinelConfig, boot: bool) -> Result<()> {
    let store = open_store(&config)?;
    let deps = SupervisorDeps {
        store,
        platform: Arc::new(SimulatedPlatform::new(true)),
        alerts: Arc::new(TracingAlertSink::new()),
        transport: Arc::new(LoopbackTransport::with_client_id(
            config.connection.client_id.as_str(),
        )),
        clock: Arc::new(SystemClock),
    };

    let mut supervisor = Supervisor::new(config, deps);
    let reason = if boot {
        StartReason::Boot
    } else {
        StartReason::ColdStart
    };
    let report = supervisor.start(reason).await;
    info!(?report, "Worker running, press Ctrl-C to exit");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received Ctrl-C, shutting down");

    // Leave the intent to run in place: an exit here is indistinguishable
    // from the process being killed.
    supervisor.shutdown().await;
    Ok(())
}

fn status(config: &SentinelConfig) -> Result<()> {
    let store = open_store(config)?;
    let monitor = HealthMonitor::new(
        store,
        Arc::new(SimulatedPlatform::new(true)),
        Arc::new(TracingAlertSink::new()),
        Arc::new(SystemClock),
        ManufacturerProfile::for_vendor(&config.device.vendor),
        config.thresholds,
    );
    let metrics = monitor.report_health_metrics();
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

fn stop(config: &SentinelConfig) -> Result<()> {
    let store = open_store(config)?;
    store
        .set_should_be_running(false)
        .context("Failed to persist stopped state")?;
    println!("Worker marked as stopped");
    Ok(())
}

async fn recover(config: &SentinelConfig, strategy: Option<RecoveryStrategy>) -> Result<()> {
    let store = open_store(config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = RecoveryManager::new(
        Arc::new(SimulatedPlatform::new(true)),
        store,
        clock,
        ManufacturerProfile::for_vendor(&config.device.vendor),
        config.recovery.step_delay(),
    );
    let result = manager.attempt_recovery(strategy).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn profile(config: &SentinelConfig, manufacturer: Option<&str>) -> Result<()> {
    let profile = ManufacturerProfile::for_vendor(manufacturer.unwrap_or(&config.device.vendor));
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let config = load_config(&args)?;

    match args.command {
        SubCommand::Run { boot } => run(config, boot).await,
        SubCommand::Status => status(&config),
        SubCommand::Stop => stop(&config),
        SubCommand::Recover { strategy } => recover(&config, strategy).await,
        SubCommand::Profile { manufacturer } => profile(&config, manufacturer.as_deref()),
    }
}
