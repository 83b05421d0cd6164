//! FtpFileStore - IFileStore implementation for FTP

use tracing::{debug, warn};

use seftpub_core::config::FtpConfig;
use seftpub_core::ports::{IFileStore, IFileStoreSession};

use crate::session::FtpSession;

/// Opens per-cycle FTP sessions against one server
#[derive(Debug, Clone)]
pub struct FtpFileStore {
    config: FtpConfig,
}

impl FtpFileStore {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FtpConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl IFileStore for FtpFileStore {
    async fn open(&self) -> anyhow::Result<Box<dyn IFileStoreSession>> {
        let session = FtpSession::connect(&self.config).await?;
        Ok(Box::new(session))
    }

    async fn check(&self) -> bool {
        let mut session = match FtpSession::connect(&self.config).await {
            Ok(session) => session,
            Err(e) => {
                warn!(host = %self.config.address(), error = %e, "FTP health check failed");
                return false;
            }
        };
        let result = session.noop().await;
        Box::new(session).close().await;
        match result {
            Ok(()) => {
                debug!(host = %self.config.address(), "FTP health check passed");
                true
            }
            Err(e) => {
                warn!(host = %self.config.address(), error = %e, "FTP health check failed");
                false
            }
        }
    }
}
