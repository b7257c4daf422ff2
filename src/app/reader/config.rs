//! Reader configuration types and defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::cache::CacheConfig;
use crate::app::client::ClientConfig;
use crate::constants::http;
use crate::errors::{ConfigError, ConfigResult};

/// How a fetch for a URL that is already in flight is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Issue another request, tracked separately by its task handle
    #[default]
    Independent,
    /// Fail the new fetch with `FetchError::DuplicateRequest`
    Reject,
}

/// Whether a network result may replace an existing cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWritePolicy {
    /// Only write when no entry exists for the key
    #[default]
    KeepExisting,
    /// Always write successful results
    Overwrite,
}

/// Configuration for [`UrlReader`](super::UrlReader)
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Resource timeout per fetch, covering redirects and the full body
    pub timeout: Duration,
    /// Percent-quote the URL path before use
    pub quote_url_path: bool,
    /// Promote `http` URLs to `https`
    pub force_https: bool,
    /// Block in `fetch` until every fetch has been delivered
    pub wait_until_done: bool,
    /// Handling of fetches for URLs already in flight
    pub duplicate_policy: DuplicatePolicy,
    /// Handling of network results when an entry already exists
    pub cache_write_policy: CacheWritePolicy,
    /// Persistent cache; `None` disables it
    pub cache: Option<CacheConfig>,
    /// HTTP transport settings
    pub client: ClientConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs_f64(http::DEFAULT_TIMEOUT_SECS),
            quote_url_path: true,
            force_https: false,
            wait_until_done: false,
            duplicate_policy: DuplicatePolicy::default(),
            cache_write_policy: CacheWritePolicy::default(),
            cache: None,
            client: ClientConfig::default(),
        }
    }
}

impl ReaderConfig {
    /// Set the resource timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable path quoting
    pub fn with_quote_url_path(mut self, enabled: bool) -> Self {
        self.quote_url_path = enabled;
        self
    }

    /// Enable or disable `http` to `https` promotion
    pub fn with_force_https(mut self, enabled: bool) -> Self {
        self.force_https = enabled;
        self
    }

    /// Enable or disable synchronous fetches
    pub fn with_wait_until_done(mut self, enabled: bool) -> Self {
        self.wait_until_done = enabled;
        self
    }

    /// Set the duplicate policy
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set the cache write policy
    pub fn with_cache_write_policy(mut self, policy: CacheWritePolicy) -> Self {
        self.cache_write_policy = policy;
        self
    }

    /// Enable the persistent cache with `config`
    pub fn with_cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(config);
        self
    }

    /// Enable the persistent cache rooted at `cache_root`
    pub fn with_cache_root(self, cache_root: impl Into<PathBuf>) -> Self {
        self.with_cache(CacheConfig::with_cache_root(cache_root))
    }

    /// Disable the persistent cache
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Set the transport configuration
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Check whether the persistent cache is enabled
    pub fn uses_cache(&self) -> bool {
        self.cache.is_some()
    }
}

/// Convert a timeout in (fractional) seconds
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for negative, NaN or infinite values
pub fn timeout_from_secs(field: &str, seconds: f64) -> ConfigResult<Duration> {
    Duration::try_from_secs_f64(seconds).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: seconds.to_string(),
        reason: format!("Expected a non-negative number of seconds ({})", e),
    })
}
