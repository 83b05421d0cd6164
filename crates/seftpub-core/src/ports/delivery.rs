//! Delivery port (driven/secondary port)
//!
//! This module defines the interface to the durable message queue. The
//! broker confirms deliveries asynchronously; implementations collect those
//! confirmations in the background so that [`IDeliveryPort::is_confirmed`]
//! is a cheap synchronous lookup.

use std::collections::BTreeMap;

use crate::domain::newtypes::DeliveryHandle;

/// Message headers attached to a publish
pub type Headers = BTreeMap<String, String>;

/// Port trait for publishing payloads and observing their confirmation
#[async_trait::async_trait]
pub trait IDeliveryPort: Send + Sync {
    /// Returns true once the broker connection and topology are established
    fn is_ready(&self) -> bool;

    /// Publishes `payload` with `headers`
    ///
    /// # Returns
    /// A handle that can later be passed to [`is_confirmed`](Self::is_confirmed).
    /// An error means the message was not handed to the broker.
    async fn publish(&self, payload: Vec<u8>, headers: Headers) -> anyhow::Result<DeliveryHandle>;

    /// Returns true if the broker has acknowledged the message behind `handle`
    ///
    /// Unknown handles and handles still awaiting confirmation both report `false`.
    fn is_confirmed(&self, handle: DeliveryHandle) -> bool;
}
