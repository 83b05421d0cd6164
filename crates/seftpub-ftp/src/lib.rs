//! SEFT Publisher FTP - Remote drop-directory adapter
//!
//! Implements the [`IFileStore`](seftpub_core::ports::IFileStore) port over
//! plain FTP. The underlying client is synchronous, so every protocol
//! exchange runs on the blocking thread pool.
//!
//! ## Modules
//!
//! - [`session`] - One authenticated connection, scoped to a transfer cycle
//! - [`store`] - [`FtpFileStore`], the session factory and liveness probe

pub mod session;
pub mod store;

pub use session::FtpSession;
pub use store::FtpFileStore;

use thiserror::Error;

/// Errors that can occur when talking to the FTP server
#[derive(Debug, Error)]
pub enum FtpError {
    /// Host name could not be resolved to an address
    #[error("Cannot resolve {0}")]
    Resolve(String),

    /// TCP connect or greeting failed
    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: suppaftp::FtpError,
    },

    /// Server rejected the credentials
    #[error("Login as {user} failed: {source}")]
    Login {
        user: String,
        #[source]
        source: suppaftp::FtpError,
    },

    /// A command after login failed
    #[error("{command} failed: {source}")]
    Command {
        command: String,
        #[source]
        source: suppaftp::FtpError,
    },

    /// The session's connection is gone (closed, or lost in a failed task)
    #[error("Session is closed")]
    SessionClosed,

    /// The blocking task running the command panicked or was cancelled
    #[error("FTP worker task failed: {0}")]
    Worker(String),
}

impl FtpError {
    pub(crate) fn command(command: impl Into<String>) -> impl FnOnce(suppaftp::FtpError) -> Self {
        let command = command.into();
        move |source| Self::Command { command, source }
    }
}
