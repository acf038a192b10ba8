//! Test server lifecycle management
//!
//! This module spawns a stub post service and a bookmark server wired to it.
//! Each test gets an isolated server with its own database.

use super::constants::*;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bookmark_server::bookmark::SqliteBookmarkStore;
use bookmark_server::bookmark_manager::BookmarkManager;
use bookmark_server::post_service::{HttpPostLookupClient, LookupRequest, LookupResponse, PostRecord};
use bookmark_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Observable state of the stub post service
#[derive(Default)]
pub struct StubPostService {
    failing: AtomicBool,
    lookups: AtomicUsize,
}

async fn stub_health() -> &'static str {
    "ok"
}

async fn stub_lookup(
    State(stub): State<Arc<StubPostService>>,
    Json(request): Json<LookupRequest>,
) -> Response {
    stub.lookups.fetch_add(1, Ordering::SeqCst);
    if stub.failing.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let posts = request
        .ids
        .into_iter()
        .filter(|id| id != UNKNOWN_POST_ID)
        .map(|id| PostRecord {
            name: post_name(&id),
            id,
        })
        .collect();
    Json(LookupResponse { posts }).into_response()
}

async fn serve_on_random_port(
    app: Router,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let port = listener
        .local_addr()
        .expect("Failed to get local address")
        .port();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
    });

    format!("http://127.0.0.1:{}", port)
}

/// Test server instance with an isolated database and post service
///
/// When dropped, both servers shut down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL of the bookmark server (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Base URL of the stub post service
    pub post_service_url: String,

    post_service: Arc<StubPostService>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    _post_service_shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a stub post service and a bookmark server on random ports
    ///
    /// # Panics
    ///
    /// Panics if either server fails to start or doesn't become ready within timeout.
    pub async fn spawn() -> Self {
        let post_service = Arc::new(StubPostService::default());
        let stub_app = Router::new()
            .route("/health", get(stub_health))
            .route("/posts/lookup", post(stub_lookup))
            .with_state(post_service.clone());
        let (post_service_shutdown_tx, post_service_shutdown_rx) =
            tokio::sync::oneshot::channel::<()>();
        let post_service_url = serve_on_random_port(stub_app, post_service_shutdown_rx).await;

        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteBookmarkStore::new(temp_db_dir.path().join("bookmark.db"))
            .expect("Failed to open bookmark store");
        let post_lookup = HttpPostLookupClient::connect(&post_service_url, POST_SERVICE_TIMEOUT_SECS)
            .await
            .expect("Failed to connect to stub post service");
        let bookmark_manager = BookmarkManager::new(Arc::new(store), Arc::new(post_lookup));

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            per_page: TEST_PER_PAGE,
            ..Default::default()
        };
        let app = make_app(config, bookmark_manager);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let base_url = serve_on_random_port(app, shutdown_rx).await;

        let server = Self {
            base_url,
            post_service_url,
            post_service,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
            _post_service_shutdown_tx: Some(post_service_shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Makes the stub post service answer lookups with 503 (or recover)
    pub fn set_post_service_failing(&self, failing: bool) {
        self.post_service.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of lookup calls the stub post service has received
    pub fn post_lookups(&self) -> usize {
        self.post_service.lookups.load(Ordering::SeqCst)
    }

    /// Waits for the server to become ready by polling the stats endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(tx) = self._post_service_shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
