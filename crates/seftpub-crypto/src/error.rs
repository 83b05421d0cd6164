//! Error types for envelope encryption

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading keys or sealing/opening envelopes
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key file could not be read
    #[error("Failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key material is not a base64-encoded 32-byte X25519 key
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Record could not be serialized
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Key agreement produced an all-zero shared secret
    #[error("Key agreement failed: recipient key is a low-order point")]
    KeyAgreement,

    /// HKDF expansion failed
    #[error("Key derivation failed")]
    KeyDerivation,

    /// AEAD sealing failed
    #[error("Encryption failed")]
    Encrypt,

    /// AEAD opening failed (wrong key or tampered token)
    #[error("Decryption failed")]
    Decrypt,

    /// Token does not have the expected shape
    #[error("Malformed token: {0}")]
    MalformedToken(String),
}

/// Result alias for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
