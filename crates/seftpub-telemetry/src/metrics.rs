//! Prometheus metrics registry for the SEFT publisher
//!
//! Provides typed, labeled counters, gauges, and histograms for the
//! transfer cycle, per-file operations and dependency health.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Counter: transfer cycles by outcome (completed, skipped_not_ready, ...)
    pub cycles_total: IntCounterVec,
    /// Counter: per-file operations by (operation, status)
    pub files_total: IntCounterVec,
    /// Gauge: entries currently held in the recent registry
    pub registry_entries: IntGauge,
    /// Histogram: duration of completed transfer cycles in seconds
    pub cycle_duration_seconds: Histogram,
    /// Gauge: 1 if the dependency passed its last health probe
    pub dependency_up: IntGaugeVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("seftpub".to_string()), None)?;

        let cycles_total = IntCounterVec::new(
            Opts::new("cycles_total", "Transfer cycles by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(cycles_total.clone()))?;

        let files_total = IntCounterVec::new(
            Opts::new("files_total", "File operations by operation and status"),
            &["operation", "status"],
        )?;
        registry.register(Box::new(files_total.clone()))?;

        let registry_entries = IntGauge::new(
            "registry_entries",
            "Files published and not yet evicted from the recent registry",
        )?;
        registry.register(Box::new(registry_entries.clone()))?;

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "cycle_duration_seconds",
                "Duration of completed transfer cycles in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 30.0, 120.0, f64::INFINITY]),
        )?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        let dependency_up = IntGaugeVec::new(
            Opts::new("dependency_up", "Result of the last health probe per dependency"),
            &["dependency"],
        )?;
        registry.register(Box::new(dependency_up.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            files_total,
            registry_entries,
            cycle_duration_seconds,
            dependency_up,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record the outcome of one cycle invocation.
    pub fn record_cycle(&self, outcome: &str) {
        self.cycles_total.with_label_values(&[outcome]).inc();
    }

    /// Record a per-file operation (list, get, publish, delete, evict).
    pub fn record_file_operation(&self, operation: &str, status: &str) {
        self.files_total
            .with_label_values(&[operation, status])
            .inc();
    }

    /// Set the registry size gauge.
    pub fn set_registry_entries(&self, count: usize) {
        self.registry_entries
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Observe a completed cycle's duration.
    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.cycle_duration_seconds.observe(duration_secs);
    }

    /// Set a dependency's health gauge.
    pub fn set_dependency_up(&self, dependency: &str, up: bool) {
        self.dependency_up
            .with_label_values(&[dependency])
            .set(i64::from(up));
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
