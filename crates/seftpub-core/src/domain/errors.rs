//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! registry bookkeeping, name validation and malformed identifiers.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The filename already has a registry entry
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// Remote file name is empty or contains control characters
    #[error("Invalid remote name: {0:?}")]
    InvalidRemoteName(String),

    /// Delivery handle could not be parsed
    #[error("Invalid delivery handle: {0}")]
    InvalidHandle(String),

    /// Transaction id could not be parsed
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
