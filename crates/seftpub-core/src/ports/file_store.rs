//! Remote file store port (driven/secondary port)
//!
//! This module defines the interface for the remote drop directory that
//! files arrive in. The primary implementation is an FTP client, but the
//! trait only assumes list/retrieve/delete semantics.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific.
//!   The reconciliation loop decides how each failure degrades (an unlistable
//!   directory becomes an empty listing, an unreadable file is retried next cycle).
//! - A session is opened once per transfer cycle and closed on every exit
//!   path. Implementations must also release the connection when the
//!   session is dropped without an explicit [`IFileStoreSession::close`].

use crate::domain::job::RetrievedJob;
use crate::domain::newtypes::RemoteName;

/// Factory for per-cycle sessions against the remote store
#[async_trait::async_trait]
pub trait IFileStore: Send + Sync {
    /// Opens a connected, authenticated session positioned in the drop directory
    async fn open(&self) -> anyhow::Result<Box<dyn IFileStoreSession>>;

    /// Lightweight reachability check over a fresh connection
    ///
    /// Never fails; any error is reported as `false`.
    async fn check(&self) -> bool;
}

/// A live connection to the remote store, scoped to one transfer cycle
#[async_trait::async_trait]
pub trait IFileStoreSession: Send {
    /// Lists the names of the files currently in the drop directory
    async fn list(&mut self) -> anyhow::Result<Vec<String>>;

    /// Retrieves a file's content, stamped with the retrieval time
    async fn get(&mut self, filename: &RemoteName) -> anyhow::Result<RetrievedJob>;

    /// Deletes a file from the drop directory
    async fn delete(&mut self, filename: &RemoteName) -> anyhow::Result<()>;

    /// Closes the connection gracefully
    async fn close(self: Box<Self>);
}
