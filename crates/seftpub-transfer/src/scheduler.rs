//! Transfer scheduler - triggers transfer cycles on a fixed period
//!
//! The [`TransferScheduler`] starts one cycle shortly after startup and
//! then one per interval. Each cycle runs on its own task, so a cycle that
//! outlasts the interval does not delay the clock: the next trigger still
//! fires on time and is turned away by the engine's overlap guard.
//!
//! ## Flow
//!
//! ```text
//! initial delay ─┐
//! interval tick ─┼──→ TransferScheduler ──spawn──→ TransferEngine::run_cycle
//! request_cycle ─┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use seftpub_core::config::Config;

use crate::engine::{CycleOutcome, TransferEngine};

/// Schedules transfer cycles for a [`TransferEngine`]
pub struct TransferScheduler {
    engine: Arc<TransferEngine>,
    interval: Duration,
    initial_delay: Duration,
    requested: Notify,
}

impl TransferScheduler {
    /// Creates a new `TransferScheduler`
    ///
    /// # Arguments
    /// * `engine` - The engine whose cycles are triggered
    /// * `interval` - Time between periodic cycles
    /// * `initial_delay` - Time from [`run`](Self::run) to the first cycle
    pub fn new(engine: Arc<TransferEngine>, interval: Duration, initial_delay: Duration) -> Self {
        info!(
            interval_ms = interval.as_millis() as u64,
            initial_delay_ms = initial_delay.as_millis() as u64,
            "Creating transfer scheduler"
        );
        Self {
            engine,
            interval,
            initial_delay,
            requested: Notify::new(),
        }
    }

    pub fn from_config(engine: Arc<TransferEngine>, config: &Config) -> Self {
        Self::new(
            engine,
            config.transfer_interval(),
            Duration::from_secs(config.transfer.initial_delay_secs),
        )
    }

    /// Requests an extra cycle as soon as possible
    ///
    /// Goes through the same overlap guard as scheduled cycles.
    pub fn request_cycle(&self) {
        debug!("Manual transfer cycle requested");
        self.requested.notify_one();
    }

    fn spawn_cycle(&self) -> JoinHandle<CycleOutcome> {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move { engine.run_cycle().await })
    }

    /// Main loop; returns after `shutdown` is cancelled and in-flight
    /// cycles have finished
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Transfer scheduler starting");

        let initial = tokio::time::sleep(self.initial_delay);
        tokio::pin!(initial);
        let mut initial_done = false;

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: Vec<JoinHandle<CycleOutcome>> = Vec::new();

        loop {
            let trigger = tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = &mut initial, if !initial_done => {
                    initial_done = true;
                    "startup"
                }
                _ = ticker.tick() => "interval",
                _ = self.requested.notified() => "manual",
            };

            debug!(trigger, "Triggering transfer cycle");
            in_flight.retain(|handle| !handle.is_finished());
            in_flight.push(self.spawn_cycle());
        }

        info!(
            in_flight = in_flight.len(),
            "Transfer scheduler stopping, waiting for running cycles"
        );
        for handle in in_flight {
            if let Err(e) = handle.await {
                warn!(error = %e, "Transfer cycle task failed");
            }
        }
        info!("Transfer scheduler stopped");
    }
}
