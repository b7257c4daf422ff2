//! reqwest-backed transport
//!
//! [`HttpTransport`] owns a multi-threaded tokio runtime. Each request runs
//! as one task on it: send, follow redirects, stream the body chunk by
//! chunk to the delegate. The completion notification runs on the runtime's
//! blocking pool, since the delegate may do synchronous disk I/O.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use crate::constants::http;
use crate::errors::{AppError, FetchError, Result};

use super::config::ClientConfig;
use super::transport::{Transport, TransportDelegate, TransportOutcome, TransportRequest};
use crate::app::registry::TaskHandle;

/// HTTP transport driven by its own runtime
#[derive(Debug)]
pub struct HttpTransport {
    runtime: Option<Runtime>,
    client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a transport with a fresh runtime and HTTP client
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the runtime cannot be started and
    /// `AppError::Fetch` if the HTTP client cannot be built
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.worker_threads == 0 {
            return Err(AppError::generic(
                "transport needs at least one worker thread",
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(http::WORKER_THREAD_NAME)
            .enable_all()
            .build()?;

        let client = {
            let _entered = runtime.enter();
            config.build_http_client()?
        };

        debug!(
            "Started HTTP transport with {} worker thread(s)",
            config.worker_threads
        );

        Ok(Self {
            runtime: Some(runtime),
            client,
            config,
        })
    }

    /// Get the transport configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one request to completion, streaming chunks to the delegate
    async fn execute(
        client: Client,
        request: TransportRequest,
        delegate: &dyn TransportDelegate,
    ) -> TransportOutcome {
        let TransportRequest {
            handle,
            url,
            timeout,
        } = request;

        let mut final_url = url.clone();
        let mut status = None;

        let result = tokio::time::timeout(timeout, async {
            let mut response = client.get(url.clone()).timeout(timeout).send().await?;
            final_url = response.url().clone();
            status = Some(response.status().as_u16());

            while let Some(chunk) = response.chunk().await? {
                delegate.did_receive_data(handle, chunk);
            }
            Ok::<(), FetchError>(())
        })
        .await;

        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_timeout() => Some(timeout_error(timeout)),
            Ok(Err(e)) => Some(e),
            Err(_elapsed) => Some(timeout_error(timeout)),
        };

        if let Some(error) = &error {
            debug!("{} for {} failed: {}", handle, url, error);
        } else if final_url != url {
            debug!("{} for {} redirected to {}", handle, url, final_url);
        }

        TransportOutcome {
            original_url: url,
            final_url,
            status,
            error,
        }
    }
}

fn timeout_error(timeout: Duration) -> FetchError {
    FetchError::Timeout {
        seconds: timeout.as_secs_f64(),
    }
}

impl Transport for HttpTransport {
    fn start(&self, request: TransportRequest, delegate: Arc<dyn TransportDelegate>) {
        let Some(runtime) = self.runtime.as_ref() else {
            warn!("Transport is shut down, failing {}", request.handle);
            delegate.did_complete(
                request.handle,
                TransportOutcome::failure(request.url, FetchError::Shutdown),
            );
            return;
        };

        let client = self.client.clone();
        let handle: TaskHandle = request.handle;
        runtime.spawn(async move {
            let outcome = Self::execute(client, request, delegate.as_ref()).await;
            let completion =
                tokio::task::spawn_blocking(move || delegate.did_complete(handle, outcome));
            if let Err(e) = completion.await {
                warn!("Completion handler for {} did not finish: {}", handle, e);
            }
        });
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use url::Url;

    struct RecordingDelegate {
        chunks: Mutex<Vec<Bytes>>,
        done: Mutex<mpsc::Sender<TransportOutcome>>,
    }

    impl TransportDelegate for RecordingDelegate {
        fn did_receive_data(&self, _handle: TaskHandle, chunk: Bytes) {
            self.chunks.lock().push(chunk);
        }

        fn did_complete(&self, _handle: TaskHandle, outcome: TransportOutcome) {
            let _ = self.done.lock().send(outcome);
        }
    }

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new(ClientConfig::default().with_worker_threads(1));
        assert!(transport.is_ok());
    }

    #[test]
    fn test_zero_worker_threads_rejected() {
        let transport = HttpTransport::new(ClientConfig::default().with_worker_threads(0));
        assert!(transport.is_err());
    }

    #[test]
    fn test_connection_failure_completes_with_error() {
        let transport = HttpTransport::new(ClientConfig::default().with_worker_threads(1)).unwrap();
        let (sender, receiver) = mpsc::channel();
        let delegate = Arc::new(RecordingDelegate {
            chunks: Mutex::new(Vec::new()),
            done: Mutex::new(sender),
        });

        // Nothing listens on port 9 (discard) on a test machine
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        transport.start(
            TransportRequest {
                handle: TaskHandle::from_raw(1),
                url: url.clone(),
                timeout: Duration::from_secs(5),
            },
            delegate.clone(),
        );

        let outcome = receiver.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(outcome.error.is_some());
        assert!(outcome.status.is_none());
        assert_eq!(outcome.original_url, url);
        assert!(delegate.chunks.lock().is_empty());
    }
}
