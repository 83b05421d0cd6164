//! Transfer engine - the reconciliation loop
//!
//! The [`TransferEngine`] runs one transfer cycle at a time against the
//! three ports: the remote file store, the encrypter and the delivery port.
//! It owns the [`SharedRegistry`] of recently published files.
//!
//! ## Cycle Flow
//!
//! 1. **Guards**: skip if the broker is not ready, skip if a cycle is
//!    already running (checked in that order)
//! 2. **Publish**: list the drop directory; fetch, encrypt and publish every
//!    file not in the registry, registering each successful publish
//! 3. **Reconcile**: over a snapshot of the registry, delete the source of
//!    every confirmed delivery, then evict entries older than the retention
//!    window. Files published in step 2 are not deleted until a later cycle,
//!    even if their confirmation has already arrived.
//!
//! Per-file failures are logged and counted, never fatal: a file that fails
//! to fetch or publish stays unregistered and is picked up again next cycle.
//! A failed delete is retried every cycle until the entry goes stale.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use futures_util::FutureExt;
use tracing::{debug, error, info, warn};

use seftpub_core::config::Config;
use seftpub_core::domain::{DeliveryHandle, RegistryEntry, RemoteName, SharedRegistry, TxId};
use seftpub_core::ports::{Headers, IDeliveryPort, IEncrypter, IFileStore, IFileStoreSession};
use seftpub_telemetry::MetricsRegistry;

use crate::clock::{Clock, SystemClock};
use crate::TransferError;

/// Header carrying the per-message transaction id
pub const TX_ID_HEADER: &str = "tx_id";

// ============================================================================
// Options and results
// ============================================================================

/// Tunables for the reconciliation loop
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Entries older than this are evicted regardless of confirmation
    pub retention: Duration,
    /// Only names with one of these suffixes are published; empty means all
    pub file_suffixes: Vec<String>,
}

impl TransferOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retention: Duration::from_std(config.retention_window())
                .unwrap_or_else(|_| Duration::hours(1)),
            file_suffixes: config.ftp.file_suffixes.clone(),
        }
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            retention: Duration::hours(1),
            file_suffixes: Vec::new(),
        }
    }
}

/// Why a cycle did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The delivery port has no usable broker connection
    NotReady,
    /// Another cycle was still in progress
    Overlapping,
}

/// Summary of a completed transfer cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Names returned by the listing
    pub listed: usize,
    /// Files published and registered this cycle
    pub published: usize,
    /// Files that could not be retrieved
    pub fetch_failures: usize,
    /// Files that could not be encrypted or published
    pub publish_failures: usize,
    /// Source files deleted after confirmed delivery
    pub deleted: usize,
    /// Deletes that failed (retried next cycle)
    pub delete_failures: usize,
    /// Registry entries evicted as stale
    pub evicted: usize,
    /// Errors encountered during the cycle (non-fatal)
    pub errors: Vec<String>,
    /// Wall-clock duration of the cycle in milliseconds
    pub duration_ms: u64,
}

/// Result of one [`TransferEngine::run_cycle`] invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Completed(CycleReport),
    /// The cycle panicked; the message is logged and the guard released
    Faulted(String),
}

impl CycleOutcome {
    /// Label used for the `cycles_total` metric
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped(SkipReason::NotReady) => "skipped_not_ready",
            Self::Skipped(SkipReason::Overlapping) => "skipped_overlap",
            Self::Completed(_) => "completed",
            Self::Faulted(_) => "faulted",
        }
    }

    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

// ============================================================================
// Overlap guard
// ============================================================================

/// Holds the busy flag for the lifetime of one cycle
///
/// Released on drop, which also covers unwinding.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ============================================================================
// TransferEngine
// ============================================================================

/// Runs transfer cycles and owns the recent registry
pub struct TransferEngine {
    file_store: Arc<dyn IFileStore>,
    delivery: Arc<dyn IDeliveryPort>,
    encrypter: Arc<dyn IEncrypter>,
    registry: SharedRegistry,
    clock: Arc<dyn Clock>,
    options: TransferOptions,
    busy: AtomicBool,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl TransferEngine {
    /// Creates an engine with an empty registry and the system clock
    pub fn new(
        file_store: Arc<dyn IFileStore>,
        delivery: Arc<dyn IDeliveryPort>,
        encrypter: Arc<dyn IEncrypter>,
        options: TransferOptions,
    ) -> Self {
        Self {
            file_store,
            delivery,
            encrypter,
            registry: SharedRegistry::new(),
            clock: Arc::new(SystemClock),
            options,
            busy: AtomicBool::new(false),
            metrics: None,
        }
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Records cycle and per-file metrics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Handle to the registry, for status reporting
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Returns true while a cycle holds the busy flag
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn record_file(&self, operation: &str, status: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_file_operation(operation, status);
        }
    }

    // ========================================================================
    // run_cycle()
    // ========================================================================

    /// Runs one transfer cycle
    ///
    /// Never returns an error: skips, per-file failures and panics are all
    /// reported through the [`CycleOutcome`].
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleOutcome {
        let outcome = self.guarded_cycle().await;
        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(outcome.label());
            metrics.set_registry_entries(self.registry.len());
            if let Some(report) = outcome.report() {
                metrics.observe_cycle_duration(report.duration_ms as f64 / 1000.0);
            }
        }
        outcome
    }

    async fn guarded_cycle(&self) -> CycleOutcome {
        if !self.delivery.is_ready() {
            warn!("Publisher is not ready, skipping transfer cycle");
            return CycleOutcome::Skipped(SkipReason::NotReady);
        }

        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            warn!("Overlapping invocation skipped");
            return CycleOutcome::Skipped(SkipReason::Overlapping);
        };

        info!("Looking for files");
        let start = Instant::now();
        match AssertUnwindSafe(self.reconcile()).catch_unwind().await {
            Ok(mut report) => {
                report.duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    listed = report.listed,
                    published = report.published,
                    deleted = report.deleted,
                    evicted = report.evicted,
                    errors = report.errors.len(),
                    duration_ms = report.duration_ms,
                    "Transfer cycle finished"
                );
                CycleOutcome::Completed(report)
            }
            Err(payload) => {
                let err = TransferError::Panicked(panic_message(payload));
                error!(error = %err, "Transfer cycle aborted");
                CycleOutcome::Faulted(err.to_string())
            }
        }
    }

    async fn reconcile(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let mut published_now = HashSet::new();

        let mut session = match self.file_store.open().await {
            Ok(session) => Some(session),
            Err(e) => {
                let err = TransferError::SessionOpen(format!("{e:#}"));
                warn!(error = %err, "Skipping publish and delete this cycle");
                self.record_file("list", "failure");
                report.errors.push(err.to_string());
                None
            }
        };

        if let Some(active) = session.as_mut() {
            let names = match active.list().await {
                Ok(names) => {
                    self.record_file("list", "success");
                    names
                }
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "Listing failed, treating as empty");
                    self.record_file("list", "failure");
                    report.errors.push(format!("list: {e:#}"));
                    Vec::new()
                }
            };
            report.listed = names.len();
            published_now = self
                .publish_new_files(&mut **active, names, &mut report)
                .await;
        }

        info!("Finished publishing files, checking for confirmed deliveries");
        self.reconcile_registry(session.as_deref_mut(), &published_now, &mut report)
            .await;

        if let Some(session) = session {
            session.close().await;
        }
        report
    }

    // ========================================================================
    // Publish pass
    // ========================================================================

    /// Returns the names published by this pass
    async fn publish_new_files(
        &self,
        session: &mut dyn IFileStoreSession,
        names: Vec<String>,
        report: &mut CycleReport,
    ) -> HashSet<RemoteName> {
        let mut published = HashSet::new();
        for raw in names {
            let filename = match RemoteName::new(raw) {
                Ok(name) => name,
                Err(e) => {
                    warn!(error = %e, "Ignoring unusable remote name");
                    continue;
                }
            };
            if !filename.has_suffix_in(&self.options.file_suffixes) {
                debug!(filename = %filename, "Ignoring file with unlisted suffix");
                continue;
            }
            if self.registry.contains(filename.as_str()) {
                continue;
            }

            info!(filename = %filename, "Found a file to publish");
            match self.transfer_file(session, &filename).await {
                Ok(_) => {
                    report.published += 1;
                    self.record_file("publish", "success");
                    published.insert(filename);
                }
                Err(e) => {
                    warn!(filename = %filename, error = %e, "Failed to transfer file");
                    match e {
                        TransferError::Fetch { .. } => {
                            report.fetch_failures += 1;
                            self.record_file("fetch", "failure");
                        }
                        _ => {
                            report.publish_failures += 1;
                            self.record_file("publish", "failure");
                        }
                    }
                    report.errors.push(e.to_string());
                }
            }
        }
        published
    }

    /// Fetches, encrypts and publishes one file, then registers it
    async fn transfer_file(
        &self,
        session: &mut dyn IFileStoreSession,
        filename: &RemoteName,
    ) -> Result<DeliveryHandle, TransferError> {
        let job = session
            .get(filename)
            .await
            .map_err(|e| TransferError::Fetch {
                filename: filename.to_string(),
                message: format!("{e:#}"),
            })?;

        let record = job
            .to_wire_record()
            .to_value()
            .map_err(|e| TransferError::Encrypt {
                filename: filename.to_string(),
                message: e.to_string(),
            })?;
        let payload = self
            .encrypter
            .encrypt(&record)
            .map_err(|e| TransferError::Encrypt {
                filename: filename.to_string(),
                message: format!("{e:#}"),
            })?;

        let tx_id = TxId::new();
        let mut headers = Headers::new();
        headers.insert(TX_ID_HEADER.to_string(), tx_id.to_string());

        let handle = self
            .delivery
            .publish(payload, headers)
            .await
            .map_err(|e| TransferError::Publish {
                filename: filename.to_string(),
                message: format!("{e:#}"),
            })?;

        self.registry
            .insert(filename.clone(), RegistryEntry::new(self.clock.now(), handle))?;
        info!(
            filename = %filename,
            tx_id = %tx_id,
            handle = %handle,
            bytes = job.size(),
            "Published file"
        );
        Ok(handle)
    }

    // ========================================================================
    // Reconcile pass
    // ========================================================================

    /// Deletes confirmed sources and evicts stale entries
    ///
    /// Without a session only eviction runs. Entries in `published_now`
    /// keep their source until the next cycle.
    async fn reconcile_registry(
        &self,
        mut session: Option<&mut (dyn IFileStoreSession + 'static)>,
        published_now: &HashSet<RemoteName>,
        report: &mut CycleReport,
    ) {
        let now = self.clock.now();

        for (filename, entry) in self.registry.snapshot() {
            let handle = entry.delivery_handle;

            if published_now.contains(&filename) {
                debug!(filename = %filename, handle = %handle, "Published this cycle, delete deferred");
            } else if let Some(session) = session.as_deref_mut() {
                if self.delivery.is_confirmed(handle) {
                    info!(filename = %filename, handle = %handle, "Deleting file with confirmed delivery");
                    match session.delete(&filename).await {
                        Ok(()) => {
                            report.deleted += 1;
                            self.record_file("delete", "success");
                            info!(filename = %filename, handle = %handle, "Deleted file");
                        }
                        Err(e) => {
                            report.delete_failures += 1;
                            self.record_file("delete", "failure");
                            warn!(filename = %filename, error = %format!("{e:#}"), "Failed to delete file");
                            report.errors.push(format!("delete {filename}: {e:#}"));
                        }
                    }
                } else {
                    debug!(filename = %filename, handle = %handle, "Delivery not yet confirmed");
                }
            }

            if entry.is_stale(now, self.options.retention) {
                self.registry.remove(filename.as_str());
                report.evicted += 1;
                self.record_file("evict", "success");
                info!(
                    filename = %filename,
                    handle = %handle,
                    first_seen_at = %entry.first_seen_at,
                    "Evicted stale registry entry"
                );
            }
        }
    }
}
