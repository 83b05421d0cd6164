//! SEFT Publisher Broker - AMQP delivery adapter
//!
//! Implements the [`IDeliveryPort`](seftpub_core::ports::IDeliveryPort)
//! port on top of an AMQP 0-9-1 broker with publisher confirms.
//!
//! ## Modules
//!
//! - [`confirms`] - Tracking of broker confirmations per delivery handle
//! - [`publisher`] - [`AmqpPublisher`], the connection loop and publish path

pub mod confirms;
pub mod publisher;

pub use confirms::{ConfirmOutcome, ConfirmTracker, PublisherStats};
pub use publisher::AmqpPublisher;

use thiserror::Error;

/// Errors that can occur when talking to the message broker
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No connection with declared topology is currently available
    #[error("Broker connection is not ready")]
    NotReady,

    /// Connecting or opening a channel failed
    #[error("Failed to connect to broker: {0}")]
    Connect(#[source] lapin::Error),

    /// Declaring the exchange/queue/binding or enabling confirms failed
    #[error("Failed to set up {what}: {source}")]
    Topology {
        what: &'static str,
        #[source]
        source: lapin::Error,
    },

    /// Connect plus topology setup did not finish in time
    #[error("Broker setup timed out after {0}s")]
    Timeout(u64),

    /// basic.publish was rejected locally
    #[error("Publish failed: {0}")]
    Publish(#[source] lapin::Error),
}
