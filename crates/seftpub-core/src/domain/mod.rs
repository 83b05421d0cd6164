//! Domain entities and bookkeeping
//!
//! This module contains the core domain types for the publisher:
//! - Newtypes for delivery handles, transaction ids and remote file names
//! - Retrieved jobs and the wire record built from them
//! - The recent registry of published files
//! - The health read model
//! - Domain-specific error types

pub mod errors;
pub mod health;
pub mod job;
pub mod newtypes;
pub mod registry;

// Re-export commonly used types
pub use errors::DomainError;
pub use health::{DependencyHealth, HealthReport, SharedHealth};
pub use job::{RetrievedJob, WireRecord};
pub use newtypes::{DeliveryHandle, RemoteName, TxId};
pub use registry::{RecentRegistry, RegistryEntry, SharedRegistry, StatusEntry, StatusView};
