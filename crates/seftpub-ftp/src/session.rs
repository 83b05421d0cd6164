//! FtpSession - IFileStoreSession implementation
//!
//! ## Design Notes
//!
//! - The `FtpStream` is moved into each `spawn_blocking` task and handed back
//!   when the command finishes. If the task dies the stream is lost and the
//!   session reports [`FtpError::SessionClosed`] from then on.
//! - Dropping a session that still owns its stream sends QUIT on the
//!   blocking pool, so early returns in a cycle never leak a connection.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::Utc;
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::{debug, warn};

use seftpub_core::config::FtpConfig;
use seftpub_core::domain::{RemoteName, RetrievedJob};
use seftpub_core::ports::IFileStoreSession;

use crate::FtpError;

/// An authenticated FTP connection positioned in the drop directory
pub struct FtpSession {
    stream: Option<FtpStream>,
    host: String,
}

impl FtpSession {
    /// Connects, logs in and changes into the configured working directory
    pub async fn connect(config: &FtpConfig) -> Result<Self, FtpError> {
        let config = config.clone();
        let host = config.address();
        let stream = tokio::task::spawn_blocking(move || Self::connect_blocking(&config))
            .await
            .map_err(|e| FtpError::Worker(e.to_string()))??;
        debug!(host = %host, "FTP session opened");
        Ok(Self {
            stream: Some(stream),
            host,
        })
    }

    fn connect_blocking(config: &FtpConfig) -> Result<FtpStream, FtpError> {
        let address = config.address();
        let socket_addr: SocketAddr = address
            .to_socket_addrs()
            .map_err(|_| FtpError::Resolve(address.clone()))?
            .next()
            .ok_or_else(|| FtpError::Resolve(address.clone()))?;
        let timeout = Duration::from_secs(config.timeout_secs);

        // Socket timeouts must be in place before the greeting is read.
        let connect_error = |source| FtpError::Connect {
            addr: address.clone(),
            source,
        };
        let tcp = TcpStream::connect_timeout(&socket_addr, timeout)
            .map_err(|e| connect_error(suppaftp::FtpError::ConnectionError(e)))?;
        tcp.set_read_timeout(Some(timeout))
            .and_then(|()| tcp.set_write_timeout(Some(timeout)))
            .map_err(|e| connect_error(suppaftp::FtpError::ConnectionError(e)))?;
        let mut stream = FtpStream::connect_with_stream(tcp).map_err(connect_error)?;

        if let Err(source) = stream.login(&config.user, &config.password) {
            let _ = stream.quit();
            return Err(FtpError::Login {
                user: config.user.clone(),
                source,
            });
        }

        let dir = config.normalized_working_directory();
        if dir != "/" {
            if let Err(source) = stream.cwd(&dir) {
                let _ = stream.quit();
                return Err(FtpError::Command {
                    command: format!("CWD {dir}"),
                    source,
                });
            }
        }
        Ok(stream)
    }

    /// Runs `op` against the stream on the blocking pool
    async fn run<T, F>(&mut self, op: F) -> Result<T, FtpError>
    where
        F: FnOnce(&mut FtpStream) -> Result<T, FtpError> + Send + 'static,
        T: Send + 'static,
    {
        let mut stream = self.stream.take().ok_or(FtpError::SessionClosed)?;
        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut stream);
            (stream, result)
        })
        .await
        .map_err(|e| FtpError::Worker(e.to_string()))?;
        self.stream = Some(stream);
        result
    }

    /// Sends NOOP; used by the liveness probe
    pub async fn noop(&mut self) -> Result<(), FtpError> {
        self.run(|stream| stream.noop().map_err(FtpError::command("NOOP")))
            .await
    }

    /// Returns true while the session still owns a connection
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[async_trait::async_trait]
impl IFileStoreSession for FtpSession {
    async fn list(&mut self) -> anyhow::Result<Vec<String>> {
        let names = self
            .run(|stream| stream.nlst(None).map_err(FtpError::command("NLST")))
            .await?;
        debug!(host = %self.host, count = names.len(), "Listed drop directory");
        Ok(names)
    }

    async fn get(&mut self, filename: &RemoteName) -> anyhow::Result<RetrievedJob> {
        let name = filename.as_str().to_string();
        let content = self
            .run(move |stream| {
                stream
                    .transfer_type(FileType::Binary)
                    .map_err(FtpError::command("TYPE I"))?;
                stream
                    .retr_as_buffer(&name)
                    .map(|cursor| cursor.into_inner())
                    .map_err(FtpError::command(format!("RETR {name}")))
            })
            .await?;
        debug!(filename = %filename, bytes = content.len(), "Retrieved file");
        Ok(RetrievedJob::new(Utc::now(), filename.clone(), content))
    }

    async fn delete(&mut self, filename: &RemoteName) -> anyhow::Result<()> {
        let name = filename.as_str().to_string();
        self.run(move |stream| stream.rm(&name).map_err(FtpError::command(format!("DELE {name}"))))
            .await?;
        debug!(filename = %filename, "Deleted file");
        Ok(())
    }

    async fn close(self: Box<Self>) {
        let mut this = self;
        if let Some(mut stream) = this.stream.take() {
            let host = this.host.clone();
            let quit = tokio::task::spawn_blocking(move || stream.quit()).await;
            match quit {
                Ok(Ok(())) => debug!(host = %host, "FTP session closed"),
                Ok(Err(e)) => debug!(host = %host, error = %e, "QUIT failed"),
                Err(e) => warn!(host = %host, error = %e, "QUIT task failed"),
            }
        }
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    let _ = stream.quit();
                });
            }
            Err(_) => {
                let _ = stream.quit();
            }
        }
    }
}
