//! Health read model
//!
//! The liveness probes write their latest results into a [`SharedHealth`];
//! the status endpoint reads a copy without waiting on any probe.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reachability of the two external dependencies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub rabbitmq: bool,
    pub ftp: bool,
}

/// Health report served by the status endpoint
///
/// A probe that has not completed yet counts as unhealthy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Logical AND of all dependencies
    pub status: bool,
    pub dependencies: DependencyHealth,
    /// When the most recent probe round finished (`None` before the first)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl HealthReport {
    pub fn new(rabbitmq: bool, ftp: bool, checked_at: DateTime<Utc>) -> Self {
        Self {
            status: rabbitmq && ftp,
            dependencies: DependencyHealth { rabbitmq, ftp },
            checked_at: Some(checked_at),
        }
    }
}

/// Cloneable handle to the latest [`HealthReport`]
#[derive(Debug, Clone, Default)]
pub struct SharedHealth {
    inner: Arc<RwLock<HealthReport>>,
}

impl SharedHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the latest report
    pub fn current(&self) -> HealthReport {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the latest report
    pub fn update(&self, report: HealthReport) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = report;
    }
}
