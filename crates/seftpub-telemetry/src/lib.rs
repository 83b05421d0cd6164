//! SEFT Publisher Telemetry - Metrics and status endpoints
//!
//! Provides:
//! - `MetricsRegistry`: Prometheus metrics (counters, gauges, histograms)
//! - `StatusServer`: HTTP server for `/healthcheck`, `/recent` and `/metrics`

pub mod metrics;
pub mod server;

pub use metrics::MetricsRegistry;
pub use server::{StatusServer, StatusState};
