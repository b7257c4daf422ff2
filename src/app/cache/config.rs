//! Cache configuration types and defaults
//!
//! The cache root is always supplied explicitly. [`default_cache_root`] is
//! provided for the application boundary (CLI, config file) to compute the
//! per-user location once; the cache itself never falls back to it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::cache;
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the persistent content cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory holding one file per entry
    pub cache_root: PathBuf,
    /// Fsync temporary files before renaming them into place
    pub durable_writes: bool,
}

impl CacheConfig {
    /// Create a cache configuration rooted at `cache_root`
    pub fn with_cache_root(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            durable_writes: cache::DURABLE_WRITES,
        }
    }

    /// Enable or disable fsync before rename
    pub fn with_durable_writes(mut self, enabled: bool) -> Self {
        self.durable_writes = enabled;
        self
    }
}

/// Per-user default cache root
///
/// - macOS: ~/Library/Caches/url-reader
/// - Linux: ~/.cache/url-reader
/// - Windows: %LOCALAPPDATA%/url-reader
pub fn default_cache_root() -> ConfigResult<PathBuf> {
    let base = dirs::cache_dir().ok_or(ConfigError::NoUserDirectory { kind: "cache" })?;
    Ok(base.join(cache::DIR_NAME))
}
