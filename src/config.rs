//! Configuration management for URL Reader
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! file, environment variables (a `.env` file is honoured by the binary) and
//! finally command-line flags. Timeouts are written as (fractional) seconds.
//!
//! ```toml
//! [reader]
//! timeout_secs = 2.5
//! force_https = true
//!
//! [cache]
//! enabled = true
//! cache_root = "/tmp/url-reader"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::cache::{default_cache_root, CacheConfig};
use crate::app::client::ClientConfig;
use crate::app::reader::{timeout_from_secs, CacheWritePolicy, DuplicatePolicy, ReaderConfig};
use crate::constants::{cache, config as config_constants, env, http};
use crate::errors::{ConfigError, ConfigResult, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Fetch behaviour
    pub reader: ReaderConfigToml,
    /// HTTP transport settings
    pub client: ClientConfigToml,
    /// Persistent cache settings
    pub cache: CacheConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// TOML-friendly reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfigToml {
    /// Resource timeout in seconds
    pub timeout_secs: f64,
    /// Percent-quote URL paths
    pub quote_url_path: bool,
    /// Promote http URLs to https
    pub force_https: bool,
    /// Block in fetch until results are delivered
    pub wait_until_done: bool,
    /// "independent" or "reject"
    pub duplicate_policy: DuplicatePolicy,
    /// "keep_existing" or "overwrite"
    pub cache_write_policy: CacheWritePolicy,
}

impl Default for ReaderConfigToml {
    fn default() -> Self {
        Self {
            timeout_secs: http::DEFAULT_TIMEOUT_SECS,
            quote_url_path: true,
            force_https: false,
            wait_until_done: false,
            duplicate_policy: DuplicatePolicy::default(),
            cache_write_policy: CacheWritePolicy::default(),
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<f64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<f64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Connect timeout in seconds
    pub connect_timeout_secs: f64,
    /// Maximum redirects per request
    pub max_redirects: usize,
    /// User agent override
    pub user_agent: Option<String>,
    /// Transport worker threads
    pub worker_threads: usize,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: Some(http::TCP_KEEPALIVE.as_secs_f64()),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs_f64()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs_f64(),
            max_redirects: http::MAX_REDIRECTS,
            user_agent: None,
            worker_threads: http::DEFAULT_WORKER_THREADS,
        }
    }
}

/// TOML-friendly cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfigToml {
    /// Use the persistent cache
    pub enabled: bool,
    /// Cache directory (None = per-user default)
    pub cache_root: Option<PathBuf>,
    /// Fsync entries before renaming them into place
    pub durable_writes: bool,
}

impl Default for CacheConfigToml {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_root: None,
            durable_writes: cache::DURABLE_WRITES,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable colored output when attached to a terminal
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            colored_output: true,
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an explicitly given file does not exist, a
    /// file cannot be read or parsed, or a value is out of range
    pub fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) if path.exists() => Some(path),
            Some(path) => return Err(ConfigError::NotFound { path }.into()),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) => {
                let mut config = Self::load_from_file(&path)?;
                config.source = Some(path);
                config
            }
            None => Self::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: AppConfig = toml::from_str(&content)?;
        debug!("Parsed configuration file: {}", path.display());
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(format!(
            "./{}",
            config_constants::LOCAL_FILE_NAME
        ))];
        if let Ok(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        debug!("No config file found in standard locations");
        None
    }

    /// Get the default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or(ConfigError::NoUserDirectory { kind: "config" })?;
        Ok(config_dir
            .join(config_constants::DIR_NAME)
            .join(config_constants::FILE_NAME))
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// `URL_READER_CACHE_DIR` sets the cache root and enables the cache;
    /// `URL_READER_TIMEOUT` sets the timeout in seconds.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(env::CACHE_DIR).filter(|dir| !dir.trim().is_empty()) {
            debug!("Cache directory from {}: {}", env::CACHE_DIR, dir);
            self.cache.enabled = true;
            self.cache.cache_root = Some(PathBuf::from(dir));
        }

        if let Some(raw) = lookup(env::TIMEOUT) {
            self.reader.timeout_secs =
                raw.trim()
                    .parse::<f64>()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: env::TIMEOUT.to_string(),
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
        }

        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        timeout_from_secs("reader.timeout_secs", self.reader.timeout_secs)?;
        timeout_from_secs("client.connect_timeout_secs", self.client.connect_timeout_secs)?;
        if let Some(secs) = self.client.tcp_keepalive_secs {
            timeout_from_secs("client.tcp_keepalive_secs", secs)?;
        }
        if let Some(secs) = self.client.pool_idle_timeout_secs {
            timeout_from_secs("client.pool_idle_timeout_secs", secs)?;
        }

        if self.client.worker_threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.worker_threads".to_string(),
                value: "0".to_string(),
                reason: "At least one worker thread is required".to_string(),
            });
        }

        Ok(())
    }

    /// Convert to the runtime reader configuration
    ///
    /// The per-user cache directory is resolved here when the cache is
    /// enabled without an explicit root.
    pub fn to_reader_config(&self) -> ConfigResult<ReaderConfig> {
        let reader = &self.reader;
        let mut config = ReaderConfig::default()
            .with_timeout(timeout_from_secs("reader.timeout_secs", reader.timeout_secs)?)
            .with_quote_url_path(reader.quote_url_path)
            .with_force_https(reader.force_https)
            .with_wait_until_done(reader.wait_until_done)
            .with_duplicate_policy(reader.duplicate_policy)
            .with_cache_write_policy(reader.cache_write_policy)
            .with_client(self.client.to_runtime_config()?);

        if self.cache.enabled {
            config = config.with_cache(self.cache.to_runtime_config()?);
        }

        Ok(config)
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ConfigResult<ClientConfig> {
        let mut config = ClientConfig {
            tcp_keepalive: self
                .tcp_keepalive_secs
                .map(|secs| timeout_from_secs("client.tcp_keepalive_secs", secs))
                .transpose()?,
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self
                .pool_idle_timeout_secs
                .map(|secs| timeout_from_secs("client.pool_idle_timeout_secs", secs))
                .transpose()?,
            pool_max_per_host: self.pool_max_per_host,
            connect_timeout: timeout_from_secs(
                "client.connect_timeout_secs",
                self.connect_timeout_secs,
            )?,
            max_redirects: self.max_redirects,
            worker_threads: self.worker_threads,
            ..ClientConfig::default()
        };

        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        Ok(config)
    }
}

impl CacheConfigToml {
    /// Convert to runtime CacheConfig, resolving the default root if unset
    pub fn to_runtime_config(&self) -> ConfigResult<CacheConfig> {
        let root = match &self.cache_root {
            Some(root) => root.clone(),
            None => default_cache_root()?,
        };
        Ok(CacheConfig::with_cache_root(root).with_durable_writes(self.durable_writes))
    }
}
