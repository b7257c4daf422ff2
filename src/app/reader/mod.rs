//! Fetch orchestration
//!
//! [`UrlReader`] is the public entry point. For each fetch it normalizes
//! the URL, serves it from the persistent cache when possible, and
//! otherwise hands it to the transport and tracks it in the
//! [`PendingTaskRegistry`] until completion. Completed network results are
//! cached under the URL the caller asked for (before redirects), so a later
//! fetch of the same URL is answered from disk even when the content came
//! from somewhere else.
//!
//! Callbacks never run on transport threads. They are queued for the thread
//! that created the reader and run when that thread drains the queue with
//! [`UrlReader::run_pending`], [`UrlReader::continue_run_loop`] or
//! [`UrlReader::run_until_done`]. With `wait_until_done` every fetch does
//! this itself before returning.
//!
//! # Module Organization
//!
//! - [`config`] - Reader configuration and the duplicate/cache-write policies
//! - [`url`] - Path quoting and scheme promotion
//! - [`fetched`] - Requests, results and the callback type
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use url_reader::app::reader::{ReaderConfig, UrlReader};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = UrlReader::new(
//!     ReaderConfig::default()
//!         .with_timeout(Duration::from_secs(5))
//!         .with_cache_root("/tmp/url-reader-cache"),
//! )?;
//!
//! for url in ["https://www.rust-lang.org/", "https://crates.io/"] {
//!     reader.fetch(url, |result| match result.error {
//!         Some(error) => println!("{}", error),
//!         None => println!("{} fully loaded, size: {}", result.url, result.data.len()),
//!     });
//! }
//!
//! reader.run_until_done(None);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod fetched;
pub mod url;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::app::cache::{CacheStats, ContentCache};
use crate::app::client::{
    HttpTransport, Transport, TransportDelegate, TransportOutcome, TransportRequest,
};
use crate::app::dispatch::{CompletionDispatcher, DeliveryQueue};
use crate::app::registry::{PendingTask, PendingTaskRegistry, TaskHandle};
use crate::constants::dispatch::RUN_LOOP_INTERVAL;
use crate::errors::{FetchError, ReaderError, ReaderResult, Result};

// Re-export main public API
pub use config::{timeout_from_secs, CacheWritePolicy, DuplicatePolicy, ReaderConfig};
pub use fetched::{FetchCallback, FetchRequest, FetchSource, Fetched};
pub use self::url::{quote_path, UrlNormalizer};

/// State shared with the transport
struct ReaderCore {
    registry: PendingTaskRegistry,
    cache: Option<ContentCache>,
    deliveries: DeliveryQueue,
    cache_write_policy: CacheWritePolicy,
}

impl ReaderCore {
    /// Write a network result to the cache; failures are logged only
    fn store(&self, key: &str, data: &[u8]) {
        let Some(cache) = &self.cache else {
            return;
        };

        let result = match self.cache_write_policy {
            CacheWritePolicy::KeepExisting => cache.set_if_absent(key, data),
            CacheWritePolicy::Overwrite => cache.set(key, data).map(|()| true),
        };

        if let Err(e) = result {
            warn!("Failed to cache response for {}: {}", key, e);
        }
    }
}

impl TransportDelegate for ReaderCore {
    fn did_receive_data(&self, handle: TaskHandle, chunk: Bytes) {
        // Unknown handles are logged by the registry
        let _ = self.registry.append_data(handle, &chunk);
    }

    fn did_complete(&self, handle: TaskHandle, outcome: TransportOutcome) {
        let Ok((mut task, settling)) = self.registry.complete(handle) else {
            return;
        };

        let cacheable = outcome.is_success();
        let TransportOutcome {
            final_url,
            status,
            error,
            ..
        } = outcome;
        task.set_current_url(final_url);

        let cache_key = task.original_url().to_string();
        let result_url = task.current_url().to_string();
        let (data, callback) = task.finish();

        let fetched = match error {
            Some(error) => {
                debug!("Fetch of {} failed: {}", cache_key, error);
                Fetched::failed(result_url, error)
            }
            None => {
                if cacheable && !data.is_empty() {
                    self.store(&cache_key, &data);
                } else if self.cache.is_some() {
                    debug!(
                        "Not caching {} (status {:?}, {} bytes)",
                        cache_key,
                        status,
                        data.len()
                    );
                }
                Fetched::from_network(result_url, data, status)
            }
        };

        self.deliveries.deliver(callback, fetched);
        drop(settling);
    }
}

/// Asynchronous URL reader with an optional persistent cache
pub struct UrlReader {
    core: Arc<ReaderCore>,
    transport: Arc<dyn Transport>,
    dispatcher: CompletionDispatcher,
    normalizer: UrlNormalizer,
    config: ReaderConfig,
}

impl UrlReader {
    /// Creates a reader backed by an [`HttpTransport`]
    ///
    /// The calling thread becomes the delivery context for callbacks.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport runtime or HTTP client cannot be
    /// created
    pub fn new(config: ReaderConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.client.clone())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a reader on top of an existing transport
    ///
    /// # Arguments
    ///
    /// * `config` - Reader configuration; `config.client` is not used
    /// * `transport` - Transport that executes requests
    pub fn with_transport(config: ReaderConfig, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = CompletionDispatcher::new();
        let cache = config.cache.clone().map(ContentCache::new);

        match &cache {
            Some(cache) => info!(
                "URL reader ready (timeout {:.3}s, cache at {})",
                config.timeout.as_secs_f64(),
                cache.cache_root().display()
            ),
            None => info!(
                "URL reader ready (timeout {:.3}s, no persistent cache)",
                config.timeout.as_secs_f64()
            ),
        }

        let core = Arc::new(ReaderCore {
            registry: PendingTaskRegistry::new(),
            cache,
            deliveries: dispatcher.queue(),
            cache_write_policy: config.cache_write_policy,
        });

        Self {
            core,
            transport,
            dispatcher,
            normalizer: UrlNormalizer::new(config.quote_url_path, config.force_https),
            config,
        }
    }

    /// Fetch `url` and deliver the result to `callback`
    ///
    /// Returns immediately unless `wait_until_done` is configured. Failures,
    /// including URLs that cannot be normalized, arrive through the callback.
    pub fn fetch<F>(&self, url: &str, callback: F)
    where
        F: FnOnce(Fetched) + Send + 'static,
    {
        self.submit(FetchRequest::new(url), callback);
    }

    /// Fetch with explicit request options
    pub fn submit<R, F>(&self, request: R, callback: F)
    where
        R: Into<FetchRequest>,
        F: FnOnce(Fetched) + Send + 'static,
    {
        self.dispatch(request.into(), Box::new(callback));
        if self.config.wait_until_done {
            self.run_until_done(None);
        }
    }

    fn dispatch(&self, request: FetchRequest, callback: FetchCallback) {
        let url = match self.normalizer.normalize(&request.url) {
            Ok(url) => url,
            Err(error) => {
                warn!("Cannot fetch {}: {}", request.url, error);
                self.core
                    .deliveries
                    .deliver(callback, Fetched::failed(request.url, error));
                return;
            }
        };

        if request.invalidate_cache {
            self.invalidate_normalized(url.as_str());
        }

        if let Some(cache) = &self.core.cache {
            match cache.get(url.as_str()) {
                Ok(Some(data)) => {
                    debug!("Serving {} from cache ({} bytes)", url, data.len());
                    self.core
                        .deliveries
                        .deliver(callback, Fetched::from_cache(url.to_string(), data));
                    return;
                }
                Ok(None) => debug!("Cache miss for {}", url),
                Err(e) => warn!("Cache lookup for {} failed, fetching: {}", url, e),
            }
        }

        let handle = self.core.registry.next_handle();
        let task = PendingTask::new(handle, url.clone(), callback);
        match self.config.duplicate_policy {
            DuplicatePolicy::Independent => {
                if self.core.registry.register(task).is_err() {
                    return;
                }
            }
            DuplicatePolicy::Reject => {
                if let Err(rejected) = self.core.registry.register_unique(task) {
                    warn!("Rejecting duplicate fetch of {}", url);
                    let (_, callback) = rejected.finish();
                    let error = FetchError::DuplicateRequest {
                        url: url.to_string(),
                    };
                    self.core
                        .deliveries
                        .deliver(callback, Fetched::failed(url.to_string(), error));
                    return;
                }
            }
        }

        debug!("Starting {} for {}", handle, url);
        let delegate: Arc<dyn TransportDelegate> = self.core.clone();
        self.transport.start(
            TransportRequest {
                handle,
                url,
                timeout: self.config.timeout,
            },
            delegate,
        );
    }

    /// Store `data` for `url` directly, bypassing the network
    ///
    /// A logged no-op when no persistent cache is configured.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError` for an empty or unusable URL and `CacheError`
    /// if the entry cannot be written
    pub fn set_cache(&self, url: &str, data: &[u8]) -> Result<()> {
        let url = self.normalize_argument(url)?;
        match &self.core.cache {
            Some(cache) => Ok(cache.set(url.as_str(), data)?),
            None => {
                warn!("No persistent cache configured, not caching {}", url);
                Ok(())
            }
        }
    }

    /// Look up the cached data for `url`
    ///
    /// # Errors
    ///
    /// Returns `ReaderError` for an empty or unusable URL and `CacheError`
    /// if an existing entry cannot be read
    pub fn get_cache(&self, url: &str) -> Result<Option<Bytes>> {
        let url = self.normalize_argument(url)?;
        match &self.core.cache {
            Some(cache) => Ok(cache.get(url.as_str())?),
            None => Ok(None),
        }
    }

    /// Remove the cache entry for `url`; returns whether one existed
    ///
    /// # Errors
    ///
    /// Returns `ReaderError` for an empty or unusable URL and `CacheError`
    /// if the entry exists but cannot be removed
    pub fn invalidate_cache_for_url(&self, url: &str) -> Result<bool> {
        let url = self.normalize_argument(url)?;
        match &self.core.cache {
            Some(cache) => Ok(cache.delete(url.as_str())?),
            None => Ok(false),
        }
    }

    /// Remove every cache entry and the cache root
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache root cannot be removed
    pub fn flush_cache(&self) -> Result<()> {
        match &self.core.cache {
            Some(cache) => Ok(cache.flush()?),
            None => {
                debug!("No persistent cache configured, nothing to flush");
                Ok(())
            }
        }
    }

    fn invalidate_normalized(&self, key: &str) {
        if let Some(cache) = &self.core.cache {
            match cache.delete(key) {
                Ok(true) => debug!("Invalidated cache entry for {}", key),
                Ok(false) => {}
                Err(e) => warn!("Failed to invalidate cache entry for {}: {}", key, e),
            }
        }
    }

    fn normalize_argument(&self, url: &str) -> ReaderResult<::url::Url> {
        if url.trim().is_empty() {
            return Err(ReaderError::MissingUrl);
        }
        self.normalizer
            .normalize(url)
            .map_err(|e| ReaderError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    /// True iff no fetch is in flight
    ///
    /// Callbacks of finished fetches may still be queued; use
    /// [`run_until_done`](Self::run_until_done) to wait for those too.
    pub fn done(&self) -> bool {
        self.core.registry.is_empty()
    }

    /// True iff nothing is in flight and no callback is waiting to run
    pub fn is_idle(&self) -> bool {
        self.core.registry.is_empty() && self.dispatcher.pending() == 0
    }

    /// Number of fetches handed to the transport and not yet completed
    pub fn in_flight(&self) -> usize {
        self.core.registry.len()
    }

    /// Run queued callbacks now; returns how many ran
    pub fn run_pending(&self) -> usize {
        self.dispatcher.run_pending()
    }

    /// Run queued callbacks for one short run-loop slice
    pub fn continue_run_loop(&self) -> usize {
        self.dispatcher.run_for(RUN_LOOP_INTERVAL)
    }

    /// Run callbacks until every fetch has been delivered
    ///
    /// Returns `false` if `timeout` elapsed first, or if called from a
    /// thread other than the one that created the reader.
    pub fn run_until_done(&self, timeout: Option<Duration>) -> bool {
        if !self.dispatcher.is_delivery_thread() {
            error!("run_until_done called off the reader's delivery thread");
            return false;
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let ran = self.dispatcher.run_pending();
            if ran == 0 && self.is_idle() {
                return true;
            }
            if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
                debug!(
                    "Stopped waiting with {} fetch(es) in flight",
                    self.in_flight()
                );
                return false;
            }
            thread::sleep(RUN_LOOP_INTERVAL);
        }
    }

    /// Get the persistent cache, if configured
    pub fn cache(&self) -> Option<&ContentCache> {
        self.core.cache.as_ref()
    }

    /// Statistics of the persistent cache, if configured
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.core.cache.as_ref().map(ContentCache::stats)
    }

    /// Get the reader configuration
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Get the URL normalizer used for fetches and cache access
    pub fn normalizer(&self) -> &UrlNormalizer {
        &self.normalizer
    }
}

impl std::fmt::Debug for UrlReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlReader")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("in_flight", &self.core.registry.len())
            .field("pending_deliveries", &self.dispatcher.pending())
            .finish()
    }
}
