//! Dependency health probes
//!
//! The [`HealthMonitor`] checks the broker through its management API and
//! the FTP server through a NOOP on a fresh connection. Both probes run
//! concurrently, once at startup and then on their own schedule, and write
//! the combined result into a [`SharedHealth`] that the status endpoint
//! reads. Transfer cycles never wait on a probe.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use seftpub_core::config::Config;
use seftpub_core::domain::{HealthReport, SharedHealth};
use seftpub_core::ports::IFileStore;
use seftpub_telemetry::MetricsRegistry;

/// Timeout for the broker management API request
const BROKER_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach the broker management API
#[derive(Debug, Clone)]
pub struct BrokerProbe {
    pub url: String,
    pub user: String,
    pub password: String,
}

/// Periodically probes the broker and the file store
pub struct HealthMonitor {
    client: reqwest::Client,
    broker: BrokerProbe,
    file_store: Arc<dyn IFileStore>,
    health: SharedHealth,
    interval: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl HealthMonitor {
    pub fn new(
        broker: BrokerProbe,
        file_store: Arc<dyn IFileStore>,
        health: SharedHealth,
        interval: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(BROKER_PROBE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            broker,
            file_store,
            health,
            interval,
            metrics: None,
        })
    }

    pub fn from_config(
        config: &Config,
        file_store: Arc<dyn IFileStore>,
        health: SharedHealth,
    ) -> anyhow::Result<Self> {
        let broker = BrokerProbe {
            url: config.broker.healthcheck_url(),
            user: config.broker.monitoring_user.clone(),
            password: config.broker.monitoring_password.clone(),
        };
        Self::new(
            broker,
            file_store,
            health,
            Duration::from_secs(config.transfer.health_check_interval_secs),
        )
    }

    /// Publishes probe results as `dependency_up` gauges
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns true if the management API answers with a success status
    pub async fn check_broker(&self) -> bool {
        let result = self
            .client
            .get(&self.broker.url)
            .basic_auth(&self.broker.user, Some(&self.broker.password))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(url = %self.broker.url, error = %e, "Broker health check failed");
                false
            }
        }
    }

    /// Runs both probes concurrently and stores the result
    pub async fn probe_once(&self) -> HealthReport {
        let (rabbitmq, ftp) = tokio::join!(self.check_broker(), self.file_store.check());
        let report = HealthReport::new(rabbitmq, ftp, Utc::now());

        if let Some(metrics) = &self.metrics {
            metrics.set_dependency_up("rabbitmq", rabbitmq);
            metrics.set_dependency_up("ftp", ftp);
        }
        if report.status {
            debug!("Dependencies healthy");
        } else {
            warn!(rabbitmq, ftp, "Dependencies unhealthy");
        }

        self.health.update(report.clone());
        report
    }

    /// Probes immediately, then every interval, until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Health monitor starting");
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
            }
        }
        info!("Health monitor stopped");
    }
}
