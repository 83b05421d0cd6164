//! Retrieved files and the wire record published for them

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemoteName;

/// A file fetched from the remote drop, as of `retrieved_at`
///
/// Immutable once constructed. The reconciliation loop consumes it once to
/// build a [`WireRecord`] and then drops it; content is never retained
/// beyond the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedJob {
    retrieved_at: DateTime<Utc>,
    filename: RemoteName,
    content: Vec<u8>,
}

impl RetrievedJob {
    pub fn new(retrieved_at: DateTime<Utc>, filename: RemoteName, content: Vec<u8>) -> Self {
        Self {
            retrieved_at,
            filename,
            content,
        }
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }

    pub fn filename(&self) -> &RemoteName {
        &self.filename
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Size of the fetched content in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Builds the record that gets encrypted and published
    pub fn to_wire_record(&self) -> WireRecord {
        WireRecord {
            filename: self.filename.as_str().to_string(),
            file: STANDARD.encode(&self.content),
            ts: self
                .retrieved_at
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Plaintext record handed to the encryption port
///
/// Field names are part of the downstream contract: `filename`, `file`
/// (standard base64 of the content) and `ts` (ISO-8601 retrieval time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    pub filename: String,
    pub file: String,
    pub ts: String,
}

impl WireRecord {
    /// Decodes the `file` field back into bytes
    pub fn decode_content(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.file)
    }

    /// Serializes the record into the JSON map form the encrypter expects
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
