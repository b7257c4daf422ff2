//! Application constants for URL Reader
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names for configuration overrides
pub mod env {
    /// Overrides the persistent cache directory (and enables the cache)
    pub const CACHE_DIR: &str = "URL_READER_CACHE_DIR";

    /// Overrides the request timeout, in (fractional) seconds
    pub const TIMEOUT: &str = "URL_READER_TIMEOUT";
}

/// HTTP transport constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("URL-Reader/", env!("CARGO_PKG_VERSION"));

    /// Default resource timeout in seconds, covering redirects and body
    pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// TCP keep-alive interval
    pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 16;

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;

    /// Worker threads in the transport runtime
    pub const DEFAULT_WORKER_THREADS: usize = 4;

    /// Thread name prefix of the transport runtime
    pub const WORKER_THREAD_NAME: &str = "url-reader-transport";
}

/// Persistent cache constants
pub mod cache {
    /// Directory name under the user cache directory
    pub const DIR_NAME: &str = "url-reader";

    /// Prefix of in-progress temporary files inside the cache root
    pub const TEMP_FILE_PREFIX: &str = ".tmp-";

    /// Whether entries are fsynced before being renamed into place
    pub const DURABLE_WRITES: bool = true;
}

/// Completion delivery constants
pub mod dispatch {
    use super::Duration;

    /// Length of one run-loop slice while waiting for completions
    pub const RUN_LOOP_INTERVAL: Duration = Duration::from_millis(10);
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_FILE_NAME: &str = "url-reader.toml";

    /// Directory name under the user config directory
    pub const DIR_NAME: &str = "url-reader";

    /// Configuration file name inside the user config directory
    pub const FILE_NAME: &str = "config.toml";
}

// Re-export commonly used constants at module level
pub use http::{DEFAULT_TIMEOUT_SECS, USER_AGENT};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version() {
        assert!(USER_AGENT.starts_with("URL-Reader/"));
        assert!(USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_timeouts_are_sane() {
        assert!(DEFAULT_TIMEOUT_SECS > 0.0);
        assert!(dispatch::RUN_LOOP_INTERVAL < Duration::from_secs(1));
        assert!(cache::TEMP_FILE_PREFIX.starts_with('.'));
    }
}
