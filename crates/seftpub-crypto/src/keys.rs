//! Recipient key material
//!
//! Keys are stored as standard base64 of the raw 32-byte X25519 value,
//! one key per file. Surrounding whitespace is ignored.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::OsRng;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{CryptoError, Result};

/// File name looked up inside a `--keys` directory
pub const RECIPIENT_KEY_FILE: &str = "recipient.pub";

/// Picks the public key file to load
///
/// A keys directory given on the command line wins over the configured path.
pub fn resolve_key_path(configured: &Path, keys_dir: Option<&Path>) -> PathBuf {
    match keys_dir {
        Some(dir) => dir.join(RECIPIENT_KEY_FILE),
        None => configured.to_path_buf(),
    }
}

fn decode_key(encoded: &str) -> Result<[u8; 32]> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::InvalidKey(format!("not base64: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| CryptoError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))
}

// ============================================================================
// RecipientPublicKey
// ============================================================================

/// Public key of the downstream consumer that can open envelopes
#[derive(Clone)]
pub struct RecipientPublicKey {
    key: PublicKey,
    kid: String,
}

impl RecipientPublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        let digest = Sha256::digest(bytes);
        let kid = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        Self {
            key: PublicKey::from(bytes),
            kid,
        }
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        decode_key(encoded).map(Self::from_bytes)
    }

    /// Reads a base64 public key from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CryptoError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        let key = Self::from_base64(&content)?;
        tracing::info!(path = %path.display(), kid = %key.kid, "Loaded recipient public key");
        Ok(key)
    }

    /// Key id: hex of the first 8 bytes of SHA-256 over the raw key
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.key.as_bytes()
    }

    pub(crate) fn public_key(&self) -> &PublicKey {
        &self.key
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.key.as_bytes())
    }
}

impl fmt::Debug for RecipientPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipientPublicKey")
            .field("kid", &self.kid)
            .finish()
    }
}

// ============================================================================
// RecipientSecretKey
// ============================================================================

/// Secret half held by the downstream consumer
pub struct RecipientSecretKey {
    secret: StaticSecret,
}

impl RecipientSecretKey {
    /// Generates a fresh random key pair
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
        }
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        decode_key(encoded).map(|bytes| Self {
            secret: StaticSecret::from(bytes),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CryptoError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_base64(&content)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.secret.to_bytes())
    }

    pub fn public_key(&self) -> RecipientPublicKey {
        RecipientPublicKey::from_bytes(PublicKey::from(&self.secret).to_bytes())
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl fmt::Debug for RecipientSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecipientSecretKey(..)")
    }
}
