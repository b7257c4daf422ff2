//! Local HTTP server for integration tests
//!
//! Runs an axum app on its own thread and runtime so tests can stay
//! synchronous, the way a caller of `UrlReader` is.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::sync::oneshot;

/// How long `/slow` takes to answer
pub const SLOW_RESPONSE: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct ServerState {
    counter: AtomicUsize,
    requests: AtomicUsize,
}

/// Test server bound to an ephemeral port on 127.0.0.1
///
/// Routes:
/// * `/` - "Hello, world"
/// * `/slow` - "Slow response" after [`SLOW_RESPONSE`]
/// * `/count/increment`, `/count/current`, `/count/reset` - a shared counter
/// * `/redirect` - 301 to `/after-redirect`
/// * `/hello/<name>` - "Hello, <name>!" with the raw path segment
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let (addr_tx, addr_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app_state = Arc::clone(&state);
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("test server runtime");

            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind test server");
                addr_tx
                    .send(listener.local_addr().expect("test server address"))
                    .expect("report test server address");

                let app = Router::new().fallback(route).with_state(app_state);
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .expect("serve test app");
            });
        });

        let addr = addr_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("test server did not start");

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Absolute URL for `path` on this server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Current value of the `/count` counter
    pub fn count(&self) -> usize {
        self.state.counter.load(Ordering::SeqCst)
    }

    /// Requests served so far, any route
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn route(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    match uri.path() {
        "/" => "Hello, world".into_response(),
        "/slow" => {
            tokio::time::sleep(SLOW_RESPONSE).await;
            "Slow response".into_response()
        }
        "/count/increment" => {
            let value = state.counter.fetch_add(1, Ordering::SeqCst) + 1;
            value.to_string().into_response()
        }
        "/count/current" => state.counter.load(Ordering::SeqCst).to_string().into_response(),
        "/count/reset" => {
            state.counter.store(0, Ordering::SeqCst);
            "0".into_response()
        }
        "/redirect" => (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, "/after-redirect")],
        )
            .into_response(),
        "/after-redirect" => "You\u{2019}ve been redirected".into_response(),
        path => match path.strip_prefix("/hello/") {
            Some(name) => format!("Hello, {}!", name).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
    }
}
