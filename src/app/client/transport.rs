//! Transport seam between the reader and the network
//!
//! A [`Transport`] issues requests without blocking and reports back through
//! a [`TransportDelegate`]: zero or more data chunks in arrival order, then
//! exactly one completion. Both delegate calls may arrive on any transport
//! thread, concurrently for different handles.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::app::registry::TaskHandle;
use crate::errors::FetchError;

/// One request handed to a transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Identity used in every delegate call for this request
    pub handle: TaskHandle,
    /// Normalized request URL
    pub url: Url,
    /// Resource timeout covering redirects and the full body
    pub timeout: Duration,
}

/// Final state of a request
#[derive(Debug)]
pub struct TransportOutcome {
    /// URL as issued, before redirects
    pub original_url: Url,
    /// URL after redirects; equals `original_url` when none were followed
    pub final_url: Url,
    /// HTTP status of the final response, if one arrived
    pub status: Option<u16>,
    /// Set when the request failed or timed out
    pub error: Option<FetchError>,
}

impl TransportOutcome {
    /// A successful outcome
    pub fn success(original_url: Url, final_url: Url, status: Option<u16>) -> Self {
        Self {
            original_url,
            final_url,
            status,
            error: None,
        }
    }

    /// A failed outcome; no redirect is assumed
    pub fn failure(original_url: Url, error: FetchError) -> Self {
        Self {
            final_url: original_url.clone(),
            original_url,
            status: None,
            error: Some(error),
        }
    }

    /// True when there is no error and the status, if any, is 2xx
    pub fn is_success(&self) -> bool {
        self.error.is_none() && is_success_status(self.status)
    }
}

/// True for a 2xx status or no status at all (non-HTTP sources)
pub fn is_success_status(status: Option<u16>) -> bool {
    status.map_or(true, |code| (200..300).contains(&code))
}

/// Receiver of transport events
pub trait TransportDelegate: Send + Sync {
    /// A body chunk arrived for `handle`
    fn did_receive_data(&self, handle: TaskHandle, chunk: Bytes);

    /// The request for `handle` finished; called exactly once per request
    fn did_complete(&self, handle: TaskHandle, outcome: TransportOutcome);
}

/// Non-blocking request issuer
pub trait Transport: Send + Sync + fmt::Debug {
    /// Start `request` and return immediately
    ///
    /// Every started request is completed through `delegate`, including
    /// requests that could not be issued at all.
    fn start(&self, request: TransportRequest, delegate: Arc<dyn TransportDelegate>);
}
