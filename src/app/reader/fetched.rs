//! Fetch requests and results

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use crate::app::client::transport::is_success_status;
use crate::errors::FetchError;

/// Callback receiving the result of one fetch, exactly once
pub type FetchCallback = Box<dyn FnOnce(Fetched) + Send + 'static>;

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchSource {
    /// Served from the persistent cache without touching the network
    Cache,
    /// Fetched over the network (possibly failed)
    Network,
}

impl fmt::Display for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchSource::Cache => f.write_str("cache"),
            FetchSource::Network => f.write_str("network"),
        }
    }
}

/// Result of one fetch as seen by the callback
///
/// `data` is empty whenever `error` is set.
#[derive(Debug)]
pub struct Fetched {
    /// Post-redirect URL for network results, the normalized URL for cache
    /// hits, the input as given when it could not be normalized
    pub url: String,
    /// Response body
    pub data: Bytes,
    /// HTTP status of the final response; `None` for cache hits and failures
    pub status: Option<u16>,
    /// Cache or network
    pub source: FetchSource,
    /// Transport failure, timeout or rejected URL
    pub error: Option<FetchError>,
}

impl Fetched {
    /// A result served from the persistent cache
    pub fn from_cache(url: String, data: Bytes) -> Self {
        Self {
            url,
            data,
            status: None,
            source: FetchSource::Cache,
            error: None,
        }
    }

    /// A completed network result
    pub fn from_network(url: String, data: Bytes, status: Option<u16>) -> Self {
        Self {
            url,
            data,
            status,
            source: FetchSource::Network,
            error: None,
        }
    }

    /// A failed fetch; carries no data
    pub fn failed(url: String, error: FetchError) -> Self {
        Self {
            url,
            data: Bytes::new(),
            status: None,
            source: FetchSource::Network,
            error: Some(error),
        }
    }

    /// True when there is no error and the status, if any, is 2xx
    pub fn is_success(&self) -> bool {
        self.error.is_none() && is_success_status(self.status)
    }

    /// True when served from the persistent cache
    pub fn is_cached(&self) -> bool {
        self.source == FetchSource::Cache
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Host of the result URL, if it has one
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    /// Convert into the body or the error
    ///
    /// # Errors
    ///
    /// Returns the fetch error, if any; HTTP error statuses are not errors
    pub fn into_result(self) -> Result<Bytes, FetchError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}

/// One call to fetch: the raw URL and whether to drop its cache entry first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// URL as given by the caller
    pub url: String,
    /// Remove the cache entry for the URL before fetching
    pub invalidate_cache: bool,
}

impl FetchRequest {
    /// Create a request for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            invalidate_cache: false,
        }
    }

    /// Invalidate the cache entry before fetching
    pub fn invalidate_cache(mut self, invalidate: bool) -> Self {
        self.invalidate_cache = invalidate;
        self
    }
}

impl From<&str> for FetchRequest {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for FetchRequest {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}
