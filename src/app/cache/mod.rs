//! Persistent, content-addressed cache
//!
//! A key to bytes store on disk. Entries are addressed by the SHA-256
//! digest of their key (normally the normalized, pre-redirect request URL)
//! and hold nothing but the response body: no headers, no expiry. Validity
//! is entirely the caller's business, through explicit invalidation or
//! flushing.
//!
//! # Module Organization
//!
//! - [`config`] - Configuration and the per-user default location
//! - [`key`] - Key digests used as entry file names
//! - [`store`] - The cache itself, with atomic writes and per-key locking
//! - [`stats`] - Entry counts and disk usage
//!
//! # Examples
//!
//! ```rust,no_run
//! use url_reader::app::cache::{CacheConfig, ContentCache};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = ContentCache::new(CacheConfig::with_cache_root("/tmp/cache"));
//!
//! cache.set("http://x/1", b"A")?;
//! assert_eq!(cache.get("http://x/1")?.as_deref(), Some(&b"A"[..]));
//!
//! cache.flush()?;
//! assert!(cache.get("http://x/1")?.is_none());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod key;
pub mod stats;
pub mod store;

// Re-export main public API
pub use config::{default_cache_root, CacheConfig};
pub use key::CacheKey;
pub use stats::{format_bytes, CacheStats};
pub use store::ContentCache;
