//! Integration tests for seftpub-transfer
//!
//! Drives the reconciliation loop, the scheduler and the health monitor
//! against in-memory ports that log every call, and a wiremock broker
//! management API.

mod common;

mod test_health;
mod test_scheduler;
