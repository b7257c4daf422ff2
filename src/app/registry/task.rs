//! Pending task types
//!
//! A pending task is one in-flight transport request: the bytes received so
//! far, the caller's callback, and the URLs before and after redirects.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use url::Url;

use crate::app::reader::FetchCallback;

/// Opaque identity of one transport-level request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Wrap a raw handle value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle value
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Task handle generation
#[derive(Debug)]
pub(crate) struct HandleGenerator {
    next_id: AtomicU64,
}

impl HandleGenerator {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn generate(&self) -> TaskHandle {
        TaskHandle(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// One in-flight fetch, exclusively owned by the registry until completion
pub struct PendingTask {
    handle: TaskHandle,
    data: BytesMut,
    callback: FetchCallback,
    original_url: Url,
    current_url: Url,
    started_at: Instant,
    chunks_received: usize,
}

impl PendingTask {
    /// Create a task with an empty accumulator
    pub fn new(handle: TaskHandle, url: Url, callback: FetchCallback) -> Self {
        Self {
            handle,
            data: BytesMut::new(),
            callback,
            current_url: url.clone(),
            original_url: url,
            started_at: Instant::now(),
            chunks_received: 0,
        }
    }

    /// Get the task handle
    pub fn handle(&self) -> TaskHandle {
        self.handle
    }

    /// The URL the caller requested (after normalization), before redirects
    pub fn original_url(&self) -> &Url {
        &self.original_url
    }

    /// The URL after redirects, as far as known
    pub fn current_url(&self) -> &Url {
        &self.current_url
    }

    /// Record the post-redirect URL
    pub fn set_current_url(&mut self, url: Url) {
        self.current_url = url;
    }

    /// Bytes accumulated so far
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of chunks appended
    pub fn chunks_received(&self) -> usize {
        self.chunks_received
    }

    /// Time since the task was created
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        self.chunks_received += 1;
    }

    /// Consume the task, yielding the accumulated bytes and the callback
    pub fn finish(self) -> (Bytes, FetchCallback) {
        (self.data.freeze(), self.callback)
    }
}

impl fmt::Debug for PendingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("handle", &self.handle)
            .field("bytes", &self.data.len())
            .field("chunks_received", &self.chunks_received)
            .field("original_url", &self.original_url.as_str())
            .field("current_url", &self.current_url.as_str())
            .finish_non_exhaustive()
    }
}
