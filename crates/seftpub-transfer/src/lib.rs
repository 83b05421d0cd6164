//! SEFT Publisher Transfer - The reconciliation loop
//!
//! Provides:
//! - Periodic transfer of new files from the drop directory to the broker
//! - Deletion of source files once their delivery is confirmed
//! - Staleness eviction of bookkeeping entries
//! - Dependency health probing
//!
//! ## Modules
//!
//! - [`clock`] - Time source abstraction for staleness checks
//! - [`engine`] - [`TransferEngine`], one transfer cycle end to end
//! - [`scheduler`] - Fixed-interval triggering of transfer cycles
//! - [`health`] - Broker and FTP liveness probes

pub mod clock;
pub mod engine;
pub mod health;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{CycleOutcome, CycleReport, SkipReason, TransferEngine, TransferOptions};
pub use health::{BrokerProbe, HealthMonitor};
pub use scheduler::TransferScheduler;

use thiserror::Error;

/// Errors that can occur while transferring a single file or running a cycle
///
/// None of these abort the process; they are logged, counted and retried
/// on the next cycle.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A session with the file store could not be opened
    #[error("Failed to open file store session: {0}")]
    SessionOpen(String),

    /// The file could not be retrieved
    #[error("Failed to fetch {filename}: {message}")]
    Fetch { filename: String, message: String },

    /// The wire record could not be encrypted
    #[error("Failed to encrypt {filename}: {message}")]
    Encrypt { filename: String, message: String },

    /// The broker did not accept the message
    #[error("Failed to publish {filename}: {message}")]
    Publish { filename: String, message: String },

    /// The published file could not be registered
    #[error("Domain error: {0}")]
    Domain(#[from] seftpub_core::domain::DomainError),

    /// The cycle panicked
    #[error("Transfer cycle panicked: {0}")]
    Panicked(String),
}
