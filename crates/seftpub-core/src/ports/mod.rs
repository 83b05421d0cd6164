//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The reconciliation loop depends on these
//! interfaces; their implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IFileStore`] / [`IFileStoreSession`] - Remote drop directory (list, get, delete)
//! - [`IDeliveryPort`] - Message broker publishing and delivery confirmation
//! - [`IEncrypter`] - Payload encryption

pub mod delivery;
pub mod encryption;
pub mod file_store;

pub use delivery::{Headers, IDeliveryPort};
pub use encryption::IEncrypter;
pub use file_store::{IFileStore, IFileStoreSession};
