//! Publisher-confirm bookkeeping
//!
//! Each publish returns a [`DeliveryHandle`] immediately; the broker's
//! verdict arrives later on a background task and is recorded here. Only a
//! plain ack marks a handle as confirmed: a nack, a returned (unroutable)
//! message or a lost channel leave it unconfirmed, so the source file is
//! kept until the registry entry goes stale.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;
use lapin::publisher_confirm::Confirmation;
use tracing::{debug, warn};

use seftpub_core::domain::DeliveryHandle;

/// Broker verdict for one published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Message accepted by the broker
    Acked,
    /// Message accepted but returned as unroutable (mandatory flag)
    Returned,
    /// Message rejected by the broker
    Nacked,
    /// Confirmation never arrived (channel closed, or confirms disabled)
    Lost(String),
}

impl ConfirmOutcome {
    /// Maps the result of awaiting a lapin publisher confirm
    pub fn from_lapin(result: lapin::Result<Confirmation>) -> Self {
        match result {
            Ok(Confirmation::Ack(None)) => Self::Acked,
            Ok(Confirmation::Ack(Some(_))) => Self::Returned,
            Ok(Confirmation::Nack(_)) => Self::Nacked,
            Ok(Confirmation::NotRequested) => Self::Lost("confirms not enabled".to_string()),
            Err(e) => Self::Lost(e.to_string()),
        }
    }
}

/// Point-in-time copy of the publisher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub published: u64,
    pub acked: u64,
    pub nacked: u64,
    pub returned: u64,
    pub lost: u64,
}

/// Set of confirmed handles plus outcome counters
///
/// Lives for the whole process, across reconnects.
#[derive(Debug, Default)]
pub struct ConfirmTracker {
    confirmed: DashSet<DeliveryHandle>,
    published: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
    returned: AtomicU64,
    lost: AtomicU64,
}

impl ConfirmTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a message handed to the broker
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the broker's verdict for `handle`
    pub fn record(&self, handle: DeliveryHandle, outcome: ConfirmOutcome) {
        match outcome {
            ConfirmOutcome::Acked => {
                self.confirmed.insert(handle);
                self.acked.fetch_add(1, Ordering::Relaxed);
                debug!(handle = %handle, "Delivery confirmed");
            }
            ConfirmOutcome::Returned => {
                self.returned.fetch_add(1, Ordering::Relaxed);
                warn!(handle = %handle, "Message returned as unroutable");
            }
            ConfirmOutcome::Nacked => {
                self.nacked.fetch_add(1, Ordering::Relaxed);
                warn!(handle = %handle, "Delivery rejected by broker");
            }
            ConfirmOutcome::Lost(reason) => {
                self.lost.fetch_add(1, Ordering::Relaxed);
                warn!(handle = %handle, reason = %reason, "Delivery confirmation lost");
            }
        }
    }

    pub fn is_confirmed(&self, handle: DeliveryHandle) -> bool {
        self.confirmed.contains(&handle)
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            published: self.published.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
        }
    }
}
