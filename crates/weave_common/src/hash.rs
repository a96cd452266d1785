//! Content hashing for change detection and drift reporting.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A content hash holding the tracked content itself, base64-encoded.
///
/// This is not a cryptographic digest. Keeping the full payload lets the
/// drift detector reconstruct exactly what was written and diff it against
/// the current file without re-running the compiler.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

/// The stored payload could not be decoded back into text.
#[derive(Debug, thiserror::Error)]
#[error("hash payload is not valid base64 text: {reason}")]
pub struct HashDecodeError {
    /// Why decoding failed.
    pub reason: String,
}

impl ContentHash {
    /// Computes a content hash from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(STANDARD.encode(data))
    }

    /// Computes a content hash from text.
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Wraps an already-encoded payload, e.g. one read back from disk.
    ///
    /// The payload is not validated here; [`ContentHash::decode`] reports
    /// corrupt records when they are actually needed.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into().trim().to_string())
    }

    /// Returns the base64 payload.
    pub fn encoded(&self) -> &str {
        &self.0
    }

    /// Decodes the payload back into the original text.
    pub fn decode(&self) -> Result<String, HashDecodeError> {
        let bytes = STANDARD.decode(self.0.as_bytes()).map_err(|e| HashDecodeError {
            reason: e.to_string(),
        })?;
        String::from_utf8(bytes).map_err(|e| HashDecodeError {
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(8).collect();
        write!(f, "ContentHash({head}..)")
    }
}
