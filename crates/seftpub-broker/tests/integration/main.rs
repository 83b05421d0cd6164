//! Integration tests for seftpub-broker
//!
//! Runs the publisher against a scripted in-process AMQP 0-9-1 server that
//! completes the connection handshake and then misbehaves during topology
//! setup.

mod common;
