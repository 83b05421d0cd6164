//! Servers that accept a connection but never answer

use std::time::Duration;

use seftpub_core::ports::IFileStore;
use seftpub_ftp::FtpFileStore;

use crate::common::silent_server;

const HOLD: Duration = Duration::from_secs(60);

#[tokio::test(flavor = "multi_thread")]
async fn test_open_times_out_without_greeting() {
    let store = FtpFileStore::new(silent_server(HOLD));

    let result = tokio::time::timeout(Duration::from_secs(8), store.open())
        .await
        .expect("open must give up after the configured timeout");
    let err = result.err().expect("open against a silent server must fail");
    assert!(err.to_string().contains("127.0.0.1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_times_out_without_greeting() {
    let store = FtpFileStore::new(silent_server(HOLD));

    let healthy = tokio::time::timeout(Duration::from_secs(8), store.check())
        .await
        .expect("check must give up after the configured timeout");
    assert!(!healthy);
}
