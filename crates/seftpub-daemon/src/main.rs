//! SEFT Publisher Daemon - FTP to RabbitMQ transfer service
//!
//! This binary runs as a long-lived service and handles:
//! - Periodic polling of the FTP drop directory
//! - Encryption and publishing of new files with publisher confirms
//! - Deletion of source files once their delivery is confirmed
//! - Health, registry and metrics endpoints over HTTP
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires the FTP, broker and crypto adapters into a
//! `TransferEngine`, then runs the scheduler, the health monitor, the status
//! server and the broker connection as concurrent tasks. All of them watch
//! one `CancellationToken` that is triggered on receipt of SIGTERM or SIGINT.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use seftpub_broker::AmqpPublisher;
use seftpub_core::config::Config;
use seftpub_core::domain::SharedHealth;
use seftpub_core::ports::IDeliveryPort;
use seftpub_crypto::{resolve_key_path, EnvelopeEncrypter, RecipientPublicKey};
use seftpub_ftp::FtpFileStore;
use seftpub_telemetry::{MetricsRegistry, StatusServer, StatusState};
use seftpub_transfer::{HealthMonitor, TransferEngine, TransferOptions, TransferScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "seftpubd",
    version,
    about = "Publishes files from an FTP drop directory to RabbitMQ"
)]
struct Args {
    /// Use alternate config file
    #[arg(long, env = "SEFTPUB_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the recipient public key (recipient.pub)
    #[arg(long, env = "SEFTPUB_KEYS")]
    keys: Option<PathBuf>,

    /// Port for the status server, overriding the configured bind port
    #[arg(long)]
    port: Option<u16>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Loads the configuration file, then applies environment and CLI overrides
fn load_config(args: &Args) -> Result<Config> {
    let path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&path)?;
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    if let Some(port) = args.port {
        config.server.set_port(port);
    }

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Invalid configuration: {}", details.join("; "));
    }
    Ok(config)
}

/// Filter directive: `-v` flags win, then `RUST_LOG`, then the configured level
fn env_filter(level: &str, verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

fn init_tracing(config: &Config, verbose: u8) {
    let filter = env_filter(&config.logging.level, verbose);
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the configuration and key material and runs every task
struct DaemonService {
    config: Config,
    encrypter: EnvelopeEncrypter,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Creates a new DaemonService
    ///
    /// Fails if the recipient public key cannot be loaded.
    fn new(config: Config, keys_dir: Option<&Path>, shutdown: CancellationToken) -> Result<Self> {
        let key_path = resolve_key_path(&config.keys.recipient_public_key, keys_dir);
        let key = RecipientPublicKey::load(&key_path)
            .with_context(|| format!("Failed to load recipient key {}", key_path.display()))?;
        info!(path = %key_path.display(), kid = %key.kid(), "Loaded recipient public key");

        let encrypter = EnvelopeEncrypter::new(key).context("Unusable recipient key")?;
        Ok(Self {
            config,
            encrypter,
            shutdown,
        })
    }

    /// Runs until the shutdown token is cancelled
    ///
    /// 1. Spawns the broker connection task
    /// 2. Builds the transfer engine over the FTP, broker and crypto adapters
    /// 3. Runs the scheduler, health monitor and status server together
    async fn run(self) -> Result<()> {
        let Self {
            config,
            encrypter,
            shutdown,
        } = self;
        let metrics = Arc::new(MetricsRegistry::new().context("Failed to create metrics")?);

        let file_store = Arc::new(FtpFileStore::new(config.ftp.clone()));

        let publisher = AmqpPublisher::new(config.broker.clone());
        let publisher_task = {
            let publisher = publisher.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { publisher.run(shutdown).await })
        };
        let delivery: Arc<dyn IDeliveryPort> = Arc::new(publisher.clone());

        let engine = Arc::new(
            TransferEngine::new(
                file_store.clone(),
                delivery.clone(),
                Arc::new(encrypter),
                TransferOptions::from_config(&config),
            )
            .with_metrics(metrics.clone()),
        );
        let scheduler = TransferScheduler::from_config(engine.clone(), &config);

        let health = SharedHealth::new();
        let monitor = HealthMonitor::from_config(&config, file_store, health.clone())?
            .with_metrics(metrics.clone());

        let server = StatusServer::new(
            StatusState {
                registry: engine.registry(),
                health,
                delivery,
                metrics,
            },
            &config.server.bind,
        )?;

        info!(
            ftp = %config.ftp.address(),
            queue = %config.broker.queue,
            interval_ms = config.transfer.interval_ms,
            bind = %config.server.bind,
            "SEFT publisher running"
        );

        let serve = async {
            let result = server.run(shutdown.clone()).await;
            if result.is_err() {
                // Stop the other tasks too
                shutdown.cancel();
            }
            result
        };

        let ((), (), served) = tokio::join!(
            scheduler.run(shutdown.clone()),
            monitor.run(shutdown.clone()),
            serve,
        );

        if let Err(e) = publisher_task.await {
            error!(error = %e, "Broker connection task failed");
        }

        let stats = publisher.stats();
        info!(
            published = stats.published,
            acked = stats.acked,
            nacked = stats.nacked,
            returned = stats.returned,
            lost = stats.lost,
            "Publisher totals"
        );

        served.context("Status server failed")
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
        _ = token.cancelled() => return,
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config, args.verbose);

    info!(version = env!("CARGO_PKG_VERSION"), "SEFT publisher starting (seftpubd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, args.keys.as_deref(), shutdown_token)?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("SEFT publisher shut down gracefully"),
        Err(e) => error!(error = %e, "SEFT publisher exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
