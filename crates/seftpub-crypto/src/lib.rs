//! SEFT Publisher Crypto - Payload envelope encryption
//!
//! Implements the [`IEncrypter`](seftpub_core::ports::IEncrypter) port.
//! Each record is sealed for a single recipient public key using an
//! ephemeral X25519 key agreement, HKDF-SHA256 key derivation and
//! ChaCha20-Poly1305, and emitted as a compact dot-separated token.
//!
//! ## Modules
//!
//! - [`keys`] - Recipient key material and key file loading
//! - [`envelope`] - Token sealing ([`EnvelopeEncrypter`]) and opening ([`EnvelopeDecrypter`])

pub mod envelope;
pub mod error;
pub mod keys;

pub use envelope::{EnvelopeDecrypter, EnvelopeEncrypter, EnvelopeHeader};
pub use error::CryptoError;
pub use keys::{resolve_key_path, RecipientPublicKey, RecipientSecretKey};
