//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the identifiers that
//! flow between the reconciliation loop and its collaborators. Each newtype
//! ensures data validity at construction time.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// DeliveryHandle
// ============================================================================

/// Opaque token identifying one published message
///
/// Handles are issued by the delivery port and are unique for the lifetime
/// of the process, including across broker reconnects, so a handle recorded
/// before a reconnect can never be confused with one issued after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryHandle(u64);

impl DeliveryHandle {
    /// Wrap a raw handle value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw handle value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl Display for DeliveryHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeliveryHandle {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| DomainError::InvalidHandle(s.to_string()))
    }
}

impl From<u64> for DeliveryHandle {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ============================================================================
// TxId
// ============================================================================

/// Transaction id attached to every published message as the `tx_id` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(Uuid);

impl TxId {
    /// Create a new random transaction id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TxId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TxId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
    }
}

// ============================================================================
// RemoteName
// ============================================================================

/// Name of a file in the remote drop directory
///
/// Names are passed verbatim into file-transfer commands, so control
/// characters (CR/LF in particular) are rejected: a name like
/// `"a.xls\r\nDELE b.xls"` would otherwise smuggle a second command.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteName(String);

impl RemoteName {
    /// Create a new RemoteName with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRemoteName` if the name is empty,
    /// blank, or contains control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() || name.chars().any(char::is_control) {
            return Err(DomainError::InvalidRemoteName(name));
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns true if the name ends with any of `suffixes` (case-insensitive)
    ///
    /// An empty suffix list accepts every name.
    #[must_use]
    pub fn has_suffix_in(&self, suffixes: &[String]) -> bool {
        if suffixes.is_empty() {
            return true;
        }
        let lower = self.0.to_lowercase();
        suffixes
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_lowercase()))
    }
}

impl Display for RemoteName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for RemoteName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RemoteName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RemoteName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RemoteName> for String {
    fn from(name: RemoteName) -> Self {
        name.0
    }
}
