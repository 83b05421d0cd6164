//! Encryption port (driven/secondary port)

/// Port trait for turning a plaintext record into an opaque payload
///
/// Implementations are stateless apart from their key material and must be
/// safe to call from any thread.
pub trait IEncrypter: Send + Sync {
    /// Serializes and encrypts `record`
    fn encrypt(&self, record: &serde_json::Value) -> anyhow::Result<Vec<u8>>;
}
