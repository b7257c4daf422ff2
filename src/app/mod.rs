//! Core application logic for URL Reader
//!
//! This module contains the fetch pipeline: the HTTP transport, the registry
//! of in-flight tasks, the persistent content cache, the completion
//! dispatcher and the [`UrlReader`] that ties them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use url_reader::app::{ReaderConfig, UrlReader};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = UrlReader::new(ReaderConfig::default().with_cache_root("/tmp/url-reader"))?;
//!
//! reader.fetch("http://example.com/", |fetched| match &fetched.error {
//!     Some(e) => eprintln!("Error: {}", e),
//!     None => println!("{} bytes from {}", fetched.data.len(), fetched.url),
//! });
//!
//! reader.run_until_done(None);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod dispatch;
pub mod reader;
pub mod registry;

// Re-export main public API
pub use cache::{format_bytes, CacheConfig, CacheKey, CacheStats, ContentCache};
pub use client::{ClientConfig, HttpTransport, Transport, TransportDelegate, TransportOutcome};
pub use dispatch::{CompletionDispatcher, DeliveryQueue};
pub use reader::{
    CacheWritePolicy, DuplicatePolicy, FetchCallback, FetchRequest, FetchSource, Fetched,
    ReaderConfig, UrlNormalizer, UrlReader,
};
pub use registry::{PendingTask, PendingTaskRegistry, TaskHandle};
