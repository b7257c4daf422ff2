//! Content-addressed cache keys
//!
//! A cache entry is addressed by the SHA-256 digest of its lookup key
//! (normally the normalized, pre-redirect URL). The digest is stored as a
//! raw 32-byte array and rendered as lowercase hex for file names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest of a cache lookup key
///
/// Deterministic and stable across process restarts: the same key string
/// always maps to the same digest and therefore the same file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Digest a lookup key
    ///
    /// # Examples
    ///
    /// ```rust
    /// use url_reader::app::cache::CacheKey;
    ///
    /// let a = CacheKey::digest("https://example.com/");
    /// let b = CacheKey::digest("https://example.com/");
    /// assert_eq!(a, b);
    /// assert_eq!(a.to_hex().len(), 64);
    /// ```
    pub fn digest(key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        CacheKey(hasher.finalize().into())
    }

    /// Parse a digest from its 64-character hex form (case insensitive)
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes).ok()?;
        Some(CacheKey(bytes))
    }

    /// Lowercase hex representation, used as the entry file name
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for CacheKey {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(CacheKey(bytes))
    }
}

impl Serialize for CacheKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        hex_string.parse().map_err(serde::de::Error::custom)
    }
}
