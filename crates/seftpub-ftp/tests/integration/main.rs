//! Integration tests for seftpub-ftp
//!
//! Runs the adapter against a scripted in-process FTP server that speaks
//! just enough of the protocol (login, CWD, PASV, NLST, RETR, DELE, NOOP).


mod test_health_check;
mod test_session;
mod test_timeouts;
