//! Prelude module for URL Reader Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use url_reader::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use url_reader::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let config = ReaderConfig::default()
//!         .with_cache_root("/tmp/url-reader")
//!         .with_wait_until_done(true);
//!     let reader = UrlReader::new(config)?;
//!
//!     reader.fetch("http://example.com/", |fetched: Fetched| {
//!         println!("{} ({})", fetched.url, fetched.source);
//!     });
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, FetchError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    CacheConfig,
    CacheStats,
    CacheWritePolicy,
    ClientConfig,
    ContentCache,
    DuplicatePolicy,

    // Results
    FetchRequest,
    FetchSource,
    Fetched,

    // Entry point
    ReaderConfig,
    UrlReader,
};
