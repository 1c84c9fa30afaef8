//! Content-derived artifact identity.
//!
//! A [`ContentId`] is the first 16 hex characters of a SHA-256 over a
//! length-prefixed sequence of parts (for files: relative path, then text).
//! Identical inputs always produce the same id; any byte change produces a
//! different one.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the full digest.
pub const CONTENT_ID_LEN: usize = 16;

/// Short deterministic fingerprint used to name artifacts.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Fingerprint `parts` in order.
    pub fn compute(parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        let full = hex::encode(hasher.finalize());
        Self(full[..CONTENT_ID_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}
