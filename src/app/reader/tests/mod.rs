//! Orchestration tests against a scripted in-process transport
//!
//! The scripted transport answers from a table of canned responses on its
//! own threads, so these tests exercise the registry, cache integration and
//! delivery without any sockets.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ::url::Url;
use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;

use super::*;
use crate::app::client::{Transport, TransportDelegate, TransportOutcome, TransportRequest};
use crate::errors::AppError;

const BASE: &str = "http://127.0.0.1:9791";

fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

/// Canned response for one URL
#[derive(Debug, Clone)]
struct Script {
    status: u16,
    chunks: Vec<Bytes>,
    redirect_to: Option<String>,
    delay: Duration,
    error: Option<String>,
}

impl Script {
    fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            chunks: vec![body.into()],
            redirect_to: None,
            delay: Duration::ZERO,
            error: None,
        }
    }

    fn chunked(chunks: &[&'static str]) -> Self {
        Self {
            chunks: chunks
                .iter()
                .map(|chunk| Bytes::from_static(chunk.as_bytes()))
                .collect(),
            ..Self::ok("")
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            chunks: Vec::new(),
            ..Self::ok("")
        }
    }

    fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    fn redirect_to(mut self, target: String) -> Self {
        self.redirect_to = Some(target);
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Thread-backed transport replaying scripts
#[derive(Debug, Default)]
struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    started: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn route(&self, url: &str, script: Script) {
        self.scripts.lock().insert(url.to_string(), script);
    }

    fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    fn start_count(&self) -> usize {
        self.started.lock().len()
    }
}

impl Transport for ScriptedTransport {
    fn start(&self, request: TransportRequest, delegate: Arc<dyn TransportDelegate>) {
        self.started.lock().push(request.url.to_string());
        let script = self
            .scripts
            .lock()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| Script::ok("").status(404));

        thread::spawn(move || {
            let TransportRequest {
                handle,
                url,
                timeout,
            } = request;

            if script.delay > timeout {
                thread::sleep(timeout);
                let error = FetchError::Timeout {
                    seconds: timeout.as_secs_f64(),
                };
                delegate.did_complete(handle, TransportOutcome::failure(url, error));
                return;
            }
            thread::sleep(script.delay);

            if let Some(message) = script.error {
                delegate.did_complete(
                    handle,
                    TransportOutcome::failure(url, FetchError::transport(message)),
                );
                return;
            }

            for chunk in script.chunks {
                delegate.did_receive_data(handle, chunk);
            }

            let final_url = match &script.redirect_to {
                Some(target) => Url::parse(target).unwrap(),
                None => url.clone(),
            };
            delegate.did_complete(
                handle,
                TransportOutcome::success(url, final_url, Some(script.status)),
            );
        });
    }
}

type Results = Arc<Mutex<Vec<Fetched>>>;

fn collector() -> (Results, impl Fn() -> Box<dyn FnOnce(Fetched) + Send>) {
    let results: Results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    let make = move || {
        let sink = Arc::clone(&sink);
        Box::new(move |fetched: Fetched| sink.lock().push(fetched)) as Box<dyn FnOnce(Fetched) + Send>
    };
    (results, make)
}

fn reader_with(config: ReaderConfig, transport: &Arc<ScriptedTransport>) -> UrlReader {
    let transport: Arc<dyn Transport> = transport.clone();
    UrlReader::with_transport(config, transport)
}

fn cached_config(temp_dir: &TempDir) -> ReaderConfig {
    ReaderConfig::default()
        .with_timeout(Duration::from_secs(2))
        .with_cache_root(temp_dir.path().join("cache"))
}

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

#[test]
fn test_callback_runs_only_on_delivery_thread() {
    let transport = ScriptedTransport::new();
    transport.route(&url("/"), Script::ok("Hello, world"));
    let reader = reader_with(ReaderConfig::default(), &transport);

    let owner = thread::current().id();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    reader.fetch(&url("/"), move |fetched| {
        *sink.lock() = Some((thread::current().id(), fetched.text()));
    });

    assert!(reader.run_until_done(WAIT));
    let seen = seen.lock().take().unwrap();
    assert_eq!(seen.0, owner);
    assert_eq!(seen.1, "Hello, world");
    assert!(reader.done());
}

#[test]
fn test_wait_until_done_delivers_before_returning() {
    let transport = ScriptedTransport::new();
    transport.route(
        &url("/hello/Ada"),
        Script::ok("Hello, Ada!").delay(Duration::from_millis(30)),
    );
    let reader = reader_with(ReaderConfig::default().with_wait_until_done(true), &transport);

    let (results, callback) = collector();
    reader.fetch(&url("/hello/Ada"), callback());

    let results = results.lock();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text(), "Hello, Ada!");
    assert_eq!(results[0].status, Some(200));
    assert_eq!(results[0].source, FetchSource::Network);
}

#[test]
fn test_chunks_are_accumulated_in_order() {
    let transport = ScriptedTransport::new();
    transport.route(&url("/"), Script::chunked(&["Hel", "lo, ", "", "world"]));
    let reader = reader_with(ReaderConfig::default(), &transport);

    let (results, callback) = collector();
    reader.fetch(&url("/"), callback());
    assert!(reader.run_until_done(WAIT));

    assert_eq!(results.lock()[0].text(), "Hello, world");
}

#[test]
fn test_redirect_caches_under_original_url() {
    let temp_dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    transport.route(
        &url("/redirect"),
        Script::ok("You've been redirected").redirect_to(url("/after-redirect")),
    );
    let reader = reader_with(cached_config(&temp_dir), &transport);

    let (results, callback) = collector();
    reader.fetch(&url("/redirect"), callback());
    assert!(reader.run_until_done(WAIT));
    assert_eq!(results.lock()[0].url, url("/after-redirect"));

    assert_eq!(
        reader.get_cache(&url("/redirect")).unwrap().as_deref(),
        Some(&b"You've been redirected"[..])
    );
    assert_eq!(reader.get_cache(&url("/after-redirect")).unwrap(), None);

    reader.fetch(&url("/redirect"), callback());
    assert!(reader.run_until_done(WAIT));

    let results = results.lock();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].source, FetchSource::Cache);
    assert_eq!(results[1].text(), "You've been redirected");
    assert_eq!(transport.start_count(), 1);
}

#[test]
fn test_cache_hit_never_touches_transport() {
    let temp_dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    let reader = reader_with(cached_config(&temp_dir), &transport);

    reader
        .set_cache(&url("/non-existent"), b"This URL does not exist")
        .unwrap();

    let (results, callback) = collector();
    reader.fetch(&url("/non-existent"), callback());
    assert!(
        results.lock().is_empty(),
        "cache hits are delivered through the queue"
    );
    assert!(reader.run_until_done(WAIT));

    let results = results.lock();
    assert_eq!(results[0].text(), "This URL does not exist");
    assert!(results[0].is_cached());
    assert!(transport.started().is_empty());
}

#[test]
fn test_force_https_hits_https_entry() {
    let temp_dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    let reader = reader_with(cached_config(&temp_dir).with_force_https(true), &transport);

    let https_url = "https://127.0.0.1:9791/https";
    reader.set_cache(https_url, b"Hello, https").unwrap();

    let (results, callback) = collector();
    reader.fetch(&url("/https"), callback());
    assert!(reader.run_until_done(WAIT));

    let results = results.lock();
    assert_eq!(results[0].text(), "Hello, https");
    assert_eq!(results[0].url, https_url);
    assert_eq!(transport.start_count(), 0);
}

#[test]
fn test_persistent_cache_and_invalidation() {
    let temp_dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    transport.route(&url("/count/increment"), Script::ok("1"));
    let reader = reader_with(cached_config(&temp_dir).with_wait_until_done(true), &transport);

    let (results, callback) = collector();
    reader.fetch(&url("/count/increment"), callback());
    reader.fetch(&url("/count/increment"), callback());
    assert_eq!(transport.start_count(), 1);

    assert!(reader.invalidate_cache_for_url(&url("/count/increment")).unwrap());
    assert_eq!(reader.get_cache(&url("/count/increment")).unwrap(), None);

    transport.route(&url("/count/increment"), Script::ok("2"));
    reader.fetch(&url("/count/increment"), callback());
    assert_eq!(transport.start_count(), 2);

    transport.route(&url("/count/increment"), Script::ok("3"));
    reader.submit(
        FetchRequest::new(url("/count/increment")).invalidate_cache(true),
        callback(),
    );
    assert_eq!(transport.start_count(), 3);

    let texts: Vec<_> = results.lock().iter().map(Fetched::text).collect();
    assert_eq!(texts, vec!["1", "1", "2", "3"]);
}

#[test]
fn test_failures_are_delivered_and_not_cached() {
    let temp_dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    transport.route(&url("/broken"), Script::failing("connection reset"));
    transport.route(&url("/status/404"), Script::ok("Not Found").status(404));
    transport.route(&url("/empty"), Script::ok(""));
    let reader = reader_with(cached_config(&temp_dir), &transport);

    let (results, callback) = collector();
    reader.fetch(&url("/broken"), callback());
    reader.fetch(&url("/status/404"), callback());
    reader.fetch(&url("/empty"), callback());
    assert!(reader.run_until_done(WAIT));

    let results = results.lock();
    assert_eq!(results.len(), 3);

    let broken = results.iter().find(|r| r.url.ends_with("/broken")).unwrap();
    assert!(broken.error.is_some());
    assert!(broken.data.is_empty());

    let missing = results.iter().find(|r| r.url.ends_with("/404")).unwrap();
    assert_eq!(missing.status, Some(404));
    assert!(missing.error.is_none());
    assert!(!missing.is_success());

    for path in ["/broken", "/status/404", "/empty"] {
        assert_eq!(reader.get_cache(&url(path)).unwrap(), None, "{}", path);
    }
    assert_eq!(reader.cache_stats().unwrap().entry_count, 0);
}

#[test]
fn test_timeout_delivers_error_and_no_data() {
    let transport = ScriptedTransport::new();
    transport.route(
        &url("/slow"),
        Script::ok("Slow response").delay(Duration::from_secs(2)),
    );
    let reader = reader_with(
        ReaderConfig::default().with_timeout(Duration::from_millis(1)),
        &transport,
    );

    let (results, callback) = collector();
    reader.fetch(&url("/slow"), callback());
    assert!(reader.run_until_done(WAIT));
    assert!(reader.done());

    let results = results.lock();
    assert!(results[0].error.as_ref().unwrap().is_timeout());
    assert!(results[0].data.is_empty());
}

#[test]
fn test_unsupported_url_without_quoting() {
    let transport = ScriptedTransport::new();
    let reader = reader_with(
        ReaderConfig::default().with_quote_url_path(false),
        &transport,
    );

    let (results, callback) = collector();
    reader.fetch(&url("/hello/Mickey Mouse"), callback());
    assert!(reader.run_until_done(WAIT));

    let results = results.lock();
    assert!(matches!(
        results[0].error,
        Some(FetchError::UnsupportedUrl { .. })
    ));
    assert_eq!(results[0].url, url("/hello/Mickey Mouse"));
    assert_eq!(transport.start_count(), 0);
}

#[test]
fn test_path_quoting_is_applied_to_requests() {
    let transport = ScriptedTransport::new();
    let reader = reader_with(ReaderConfig::default(), &transport);

    let (_results, callback) = collector();
    reader.fetch(&url("/hello/Mickey Mouse"), callback());
    reader.fetch(&url("/hello/Mickey%2FMouse"), callback());
    assert!(reader.run_until_done(WAIT));

    assert_eq!(
        transport.started(),
        vec![url("/hello/Mickey%20Mouse"), url("/hello/Mickey%2FMouse")]
    );
}

#[test]
fn test_duplicates_are_independent_by_default() {
    let transport = ScriptedTransport::new();
    transport.route(
        &url("/hello/A"),
        Script::ok("Hello, A!").delay(Duration::from_millis(50)),
    );
    let reader = reader_with(ReaderConfig::default(), &transport);

    let (results, callback) = collector();
    reader.fetch(&url("/hello/A"), callback());
    reader.fetch(&url("/hello/A"), callback());
    assert_eq!(reader.in_flight(), 2);
    assert!(reader.run_until_done(WAIT));

    let results = results.lock();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.text() == "Hello, A!"));
    assert_eq!(transport.start_count(), 2);
}

#[test]
fn test_duplicates_rejected_by_policy() {
    let transport = ScriptedTransport::new();
    transport.route(
        &url("/hello/A"),
        Script::ok("Hello, A!").delay(Duration::from_millis(50)),
    );
    let reader = reader_with(
        ReaderConfig::default().with_duplicate_policy(DuplicatePolicy::Reject),
        &transport,
    );

    let (results, callback) = collector();
    reader.fetch(&url("/hello/A"), callback());
    reader.fetch(&url("/hello/A"), callback());
    assert!(reader.run_until_done(WAIT));

    let results = results.lock();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r.error, Some(FetchError::DuplicateRequest { .. })))
            .count(),
        1
    );
    assert_eq!(transport.start_count(), 1);
}

#[test]
fn test_rejecting_duplicates_from_many_threads() {
    let transport = ScriptedTransport::new();
    transport.route(
        &url("/count/increment"),
        Script::ok("1").delay(Duration::from_millis(50)),
    );
    let reader = reader_with(
        ReaderConfig::default().with_duplicate_policy(DuplicatePolicy::Reject),
        &transport,
    );
    let (results, callback) = collector();
    let barrier = std::sync::Barrier::new(16);

    thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                let callback = callback();
                barrier.wait();
                reader.fetch(&url("/count/increment"), callback);
            });
        }
    });
    assert!(reader.run_until_done(WAIT));

    assert_eq!(transport.start_count(), 1);
    let results = results.lock();
    assert_eq!(results.len(), 16);
    assert_eq!(results.iter().filter(|r| r.error.is_none()).count(), 1);
}

#[test]
fn test_keep_existing_entry_written_meanwhile() {
    let temp_dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    transport.route(
        &url("/hello/B"),
        Script::ok("Hello, B!").delay(Duration::from_millis(50)),
    );
    let reader = reader_with(cached_config(&temp_dir), &transport);

    let (results, callback) = collector();
    reader.fetch(&url("/hello/B"), callback());
    reader.set_cache(&url("/hello/B"), b"pinned").unwrap();
    assert!(reader.run_until_done(WAIT));

    assert_eq!(results.lock()[0].text(), "Hello, B!");
    assert_eq!(
        reader.get_cache(&url("/hello/B")).unwrap().as_deref(),
        Some(&b"pinned"[..])
    );
}

#[test]
fn test_overwrite_policy_replaces_entry() {
    let temp_dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    transport.route(
        &url("/hello/B"),
        Script::ok("Hello, B!").delay(Duration::from_millis(50)),
    );
    let reader = reader_with(
        cached_config(&temp_dir).with_cache_write_policy(CacheWritePolicy::Overwrite),
        &transport,
    );

    let (_results, callback) = collector();
    reader.fetch(&url("/hello/B"), callback());
    reader.set_cache(&url("/hello/B"), b"pinned").unwrap();
    assert!(reader.run_until_done(WAIT));

    assert_eq!(
        reader.get_cache(&url("/hello/B")).unwrap().as_deref(),
        Some(&b"Hello, B!"[..])
    );
}

#[test]
fn test_multiple_urls_all_delivered() {
    let transport = ScriptedTransport::new();
    let names = ["A", "B", "C", "D", "E", "F"];
    for (i, name) in names.iter().enumerate() {
        transport.route(
            &url(&format!("/hello/{}", name)),
            Script::ok(format!("Hello, {}!", name)).delay(Duration::from_millis(5 * (6 - i as u64))),
        );
    }
    let reader = reader_with(ReaderConfig::default(), &transport);

    let (results, callback) = collector();
    for name in names {
        reader.fetch(&url(&format!("/hello/{}", name)), callback());
    }
    while !reader.done() {
        reader.continue_run_loop();
    }
    assert!(reader.run_until_done(WAIT));

    let joined: String = results.lock().iter().map(Fetched::text).collect();
    for name in names {
        assert!(joined.contains(&format!("Hello, {}!", name)));
    }
}

#[test]
fn test_invalid_cache_arguments() {
    let temp_dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    let reader = reader_with(cached_config(&temp_dir), &transport);

    assert!(matches!(
        reader.invalidate_cache_for_url(""),
        Err(AppError::Reader(ReaderError::MissingUrl))
    ));
    assert!(matches!(
        reader.invalidate_cache_for_url("not a url"),
        Err(AppError::Reader(ReaderError::InvalidUrl { .. }))
    ));
    assert!(!reader
        .invalidate_cache_for_url("http://non-existing.example.org/")
        .unwrap());
    assert_eq!(
        reader.get_cache("http://non-existing.example.org/").unwrap(),
        None
    );
}

#[test]
fn test_cache_calls_without_cache_are_noops() {
    let transport = ScriptedTransport::new();
    let reader = reader_with(ReaderConfig::default(), &transport);

    reader.set_cache(&url("/"), b"ignored").unwrap();
    assert_eq!(reader.get_cache(&url("/")).unwrap(), None);
    assert!(!reader.invalidate_cache_for_url(&url("/")).unwrap());
    reader.flush_cache().unwrap();
    assert!(reader.cache().is_none());
    assert!(reader.cache_stats().is_none());
}

#[test]
fn test_flush_removes_cache_root() {
    let temp_dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    let reader = reader_with(cached_config(&temp_dir), &transport);

    reader.set_cache("http://x/1", b"A").unwrap();
    assert_eq!(
        reader.get_cache("http://x/1").unwrap().as_deref(),
        Some(&b"A"[..])
    );

    reader.flush_cache().unwrap();
    assert_eq!(reader.get_cache("http://x/1").unwrap(), None);
    assert!(!temp_dir.path().join("cache").exists());
}

#[test]
fn test_run_until_done_refuses_foreign_thread() {
    let transport = ScriptedTransport::new();
    let reader = reader_with(ReaderConfig::default(), &transport);

    let finished = thread::scope(|scope| {
        scope
            .spawn(|| reader.run_until_done(Some(Duration::from_millis(10))))
            .join()
            .unwrap()
    });
    assert!(!finished);
    assert!(reader.run_until_done(WAIT));
}
