//! FtpSession against the scripted server

use seftpub_core::domain::RemoteName;
use seftpub_core::ports::IFileStore;
use seftpub_ftp::FtpFileStore;

use crate::common::FakeFtpServer;

fn name(s: &str) -> RemoteName {
    RemoteName::new(s).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_get_delete() {
    let server = FakeFtpServer::start(&[("a.xlsx", b"alpha"), ("b.xlsx", b"bravo")]);
    let store = FtpFileStore::new(server.config());

    let mut session = store.open().await.expect("open session");

    let mut names = session.list().await.expect("list");
    names.sort();
    assert_eq!(names, vec!["a.xlsx", "b.xlsx"]);

    let job = session.get(&name("a.xlsx")).await.expect("get");
    assert_eq!(job.filename().as_str(), "a.xlsx");
    assert_eq!(job.content(), b"alpha");

    session.delete(&name("a.xlsx")).await.expect("delete");
    session.close().await;

    assert_eq!(server.files(), vec!["b.xlsx"]);
    assert_eq!(server.count("TYPE"), 1);
    assert_eq!(server.count("QUIT"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_missing_file_fails_but_session_survives() {
    let server = FakeFtpServer::start(&[("a.xlsx", b"alpha")]);
    let store = FtpFileStore::new(server.config());
    let mut session = store.open().await.expect("open session");

    let err = session.get(&name("gone.xlsx")).await.unwrap_err();
    assert!(err.to_string().contains("RETR gone.xlsx"));

    let job = session.get(&name("a.xlsx")).await.expect("session still usable");
    assert_eq!(job.size(), 5);
    session.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_missing_file_fails() {
    let server = FakeFtpServer::start(&[]);
    let store = FtpFileStore::new(server.config());
    let mut session = store.open().await.expect("open session");

    assert!(session.delete(&name("gone.xlsx")).await.is_err());
    session.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_changes_into_normalised_working_directory() {
    let server = FakeFtpServer::start(&[]);
    let mut config = server.config();
    config.working_directory = "\\\\share\\inbound".to_string();
    let store = FtpFileStore::new(config);

    let session = store.open().await.expect("open session");
    session.close().await;

    assert!(server.commands().contains(&"CWD inbound".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_root_working_directory_skips_cwd() {
    let server = FakeFtpServer::start(&[]);
    let store = FtpFileStore::new(server.config());

    let session = store.open().await.expect("open session");
    session.close().await;

    assert_eq!(server.count("CWD"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bad_credentials_fail_open() {
    let server = FakeFtpServer::start(&[]);
    let mut config = server.config();
    config.password = "wrong".to_string();
    let store = FtpFileStore::new(config);

    let err = store.open().await.err().expect("login should fail");
    assert!(err.to_string().contains("Login as ons failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_working_directory_fails_open() {
    let server = FakeFtpServer::start(&[]);
    let mut config = server.config();
    config.working_directory = "missing".to_string();
    let store = FtpFileStore::new(config);

    assert!(store.open().await.is_err());
    // The half-open connection is still closed.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(server.count("QUIT"), 1);
}
