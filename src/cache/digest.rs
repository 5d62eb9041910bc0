//! Content-derived cache keys
//!
//! A `CacheKey` is the lowercase hex SHA-256 of a request description. Equal
//! inputs always map to equal keys, across runs and machines.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 digest identifying a cached response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `message`
    pub fn digest(message: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(message.as_bytes())))
    }

    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the cache file holding the entry for this key
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
