//! SEFT Publisher Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RetrievedJob`, `WireRecord`, `RecentRegistry`, `HealthReport`
//! - **Newtypes** - `DeliveryHandle`, `TxId`, `RemoteName`
//! - **Port definitions** - Traits for adapters: `IFileStore`, `IDeliveryPort`, `IEncrypter`
//! - **Configuration** - YAML configuration with environment overrides
//!
//! # Architecture
//!
//! The domain module contains pure bookkeeping with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`seftpub-ftp`, `seftpub-broker`, `seftpub-crypto`), and the
//! reconciliation loop in `seftpub-transfer` drives them.

pub mod config;
pub mod domain;
pub mod ports;
