//! Envelope sealing and opening
//!
//! Token layout (all parts URL-safe base64 without padding):
//!
//! ```text
//! header . ephemeral_public_key . nonce . ciphertext
//! ```
//!
//! The header is JSON `{"alg":"ECDH-ES+HKDF-SHA256","enc":"C20P","kid":...}`
//! and its encoded form is the AEAD associated data, so it cannot be
//! swapped without failing authentication.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey};

use seftpub_core::ports::IEncrypter;

use crate::error::{CryptoError, Result};
use crate::keys::{RecipientPublicKey, RecipientSecretKey};

pub const ALG: &str = "ECDH-ES+HKDF-SHA256";
pub const ENC: &str = "C20P";
const HKDF_INFO: &[u8] = b"seftpub envelope v1";
const NONCE_LEN: usize = 12;

/// Protected header carried in the first token segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub alg: String,
    pub enc: String,
    pub kid: String,
}

/// Derives the content key; salt binds both public keys
fn derive_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> Result<[u8; 32]> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral);
    salt[32..].copy_from_slice(recipient);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(key)
}

// ============================================================================
// EnvelopeEncrypter
// ============================================================================

/// Seals records for one recipient public key
#[derive(Debug, Clone)]
pub struct EnvelopeEncrypter {
    recipient: RecipientPublicKey,
    header: String,
}

impl EnvelopeEncrypter {
    pub fn new(recipient: RecipientPublicKey) -> Result<Self> {
        let header = EnvelopeHeader {
            alg: ALG.to_string(),
            enc: ENC.to_string(),
            kid: recipient.kid().to_string(),
        };
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        Ok(Self { recipient, header })
    }

    pub fn recipient(&self) -> &RecipientPublicKey {
        &self.recipient
    }

    /// Seals `plaintext` into a compact token
    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_pk = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(self.recipient.public_key());
        if !shared.was_contributory() {
            return Err(CryptoError::KeyAgreement);
        }

        let key = derive_key(
            shared.as_bytes(),
            ephemeral_pk.as_bytes(),
            self.recipient.as_bytes(),
        )?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| CryptoError::Encrypt)?;
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: self.header.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Encrypt)?;

        Ok(format!(
            "{}.{}.{}.{}",
            self.header,
            URL_SAFE_NO_PAD.encode(ephemeral_pk.as_bytes()),
            URL_SAFE_NO_PAD.encode(nonce),
            URL_SAFE_NO_PAD.encode(ciphertext),
        ))
    }
}

impl IEncrypter for EnvelopeEncrypter {
    fn encrypt(&self, record: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        let plaintext = serde_json::to_vec(record).map_err(CryptoError::from)?;
        let token = self.seal(&plaintext)?;
        Ok(token.into_bytes())
    }
}

// ============================================================================
// EnvelopeDecrypter
// ============================================================================

/// Opens tokens sealed for the matching public key
#[derive(Debug)]
pub struct EnvelopeDecrypter {
    secret: RecipientSecretKey,
}

impl EnvelopeDecrypter {
    pub fn new(secret: RecipientSecretKey) -> Self {
        Self { secret }
    }

    /// Parses and authenticates the header of `token` without decrypting
    pub fn header(token: &str) -> Result<EnvelopeHeader> {
        let encoded = token
            .split('.')
            .next()
            .ok_or_else(|| CryptoError::MalformedToken("empty token".into()))?;
        let bytes = decode_segment(encoded, "header")?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CryptoError::MalformedToken(format!("header: {e}")))
    }

    /// Opens `token` and returns the plaintext
    pub fn open(&self, token: &str) -> Result<Vec<u8>> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header_b64, ephemeral_b64, nonce_b64, ciphertext_b64] = parts.as_slice() else {
            return Err(CryptoError::MalformedToken(format!(
                "expected 4 segments, got {}",
                parts.len()
            )));
        };

        let header = Self::header(token)?;
        if header.alg != ALG || header.enc != ENC {
            return Err(CryptoError::MalformedToken(format!(
                "unsupported algorithm {}/{}",
                header.alg, header.enc
            )));
        }

        let ephemeral: [u8; 32] = decode_segment(ephemeral_b64, "ephemeral key")?
            .try_into()
            .map_err(|_| CryptoError::MalformedToken("ephemeral key length".into()))?;
        let nonce = decode_segment(nonce_b64, "nonce")?;
        if nonce.len() != NONCE_LEN {
            return Err(CryptoError::MalformedToken("nonce length".into()));
        }
        let ciphertext = decode_segment(ciphertext_b64, "ciphertext")?;

        let ephemeral_pk = PublicKey::from(ephemeral);
        let shared = self.secret.secret().diffie_hellman(&ephemeral_pk);
        if !shared.was_contributory() {
            return Err(CryptoError::KeyAgreement);
        }
        let recipient = self.secret.public_key();
        let key = derive_key(shared.as_bytes(), &ephemeral, recipient.as_bytes())?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| CryptoError::Decrypt)?;

        cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: header_b64.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Decrypt)
    }

    /// Opens `token` and parses the plaintext as a JSON record
    pub fn decrypt_record(&self, token: &[u8]) -> Result<serde_json::Value> {
        let token = std::str::from_utf8(token)
            .map_err(|_| CryptoError::MalformedToken("token is not UTF-8".into()))?;
        let plaintext = self.open(token)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CryptoError::MalformedToken(format!("{what}: {e}")))
}
