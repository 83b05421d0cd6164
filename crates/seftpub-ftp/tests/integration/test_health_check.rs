//! FtpFileStore::check against the scripted server

use seftpub_core::ports::IFileStore;
use seftpub_ftp::FtpFileStore;

use crate::common::FakeFtpServer;

#[tokio::test(flavor = "multi_thread")]
async fn test_check_sends_noop_on_fresh_connection() {
    let server = FakeFtpServer::start(&[]);
    let store = FtpFileStore::new(server.config());

    assert!(store.check().await);
    assert!(store.check().await);

    assert_eq!(server.count("USER"), 2);
    assert_eq!(server.count("NOOP"), 2);
    assert_eq!(server.count("QUIT"), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_false_on_rejected_login() {
    let server = FakeFtpServer::start(&[]);
    let mut config = server.config();
    config.user = "intruder".to_string();
    let store = FtpFileStore::new(config);

    assert!(!store.check().await);
    assert_eq!(server.count("NOOP"), 0);
}
