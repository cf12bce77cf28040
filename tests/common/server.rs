//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own databases, spool
//! directory and worker pool.

use super::constants::*;
use super::fixtures::{seed_user, TestUser};
use rewound_server::history::{HistoryStore, SqliteHistoryStore};
use rewound_server::import::{
    ImportJobStore, ImportWorkerPool, ImportWorkerPoolConfig, ProgressStore, SqliteImportJobStore,
};
use rewound_server::server::state::ServerState;
use rewound_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use rewound_server::user::{SqliteUserStore, UserStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated databases and a live worker pool
///
/// When dropped, the server and its workers shut down and temp resources
/// are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Primary seeded user ("alice")
    pub user: TestUser,

    /// Secondary seeded user ("bob"), for cross-user access tests
    pub second_user: TestUser,

    /// User store for direct database access in tests
    pub user_store: Arc<dyn UserStore>,

    /// History store for direct database access in tests
    pub history: Arc<dyn HistoryStore>,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Creates a temporary db_dir with empty databases and a spool dir
    /// 2. Seeds two users with session tokens
    /// 3. Starts an import worker pool with a fast poll cadence
    /// 4. Binds to a random port (127.0.0.1:0)
    /// 5. Spawns the server in a background task
    /// 6. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if any of the above fails or the server doesn't become
    /// ready within the timeout.
    pub async fn spawn() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_dir = temp_dir.path();

        let user_store: Arc<dyn UserStore> = Arc::new(
            SqliteUserStore::open(&db_dir.join("user.db")).expect("Failed to open user store"),
        );
        let history: Arc<dyn HistoryStore> = Arc::new(
            SqliteHistoryStore::open(&db_dir.join("history.db"))
                .expect("Failed to open history store"),
        );
        let jobs: Arc<dyn ImportJobStore> = Arc::new(
            SqliteImportJobStore::open(&db_dir.join("import_jobs.db"))
                .expect("Failed to open import job store"),
        );

        let spool_dir = db_dir.join("import_spool");
        std::fs::create_dir_all(&spool_dir).expect("Failed to create spool dir");

        let user = seed_user(user_store.as_ref(), TEST_USER_HANDLE);
        let second_user = seed_user(user_store.as_ref(), SECOND_USER_HANDLE);

        let progress = Arc::new(ProgressStore::new(jobs.clone()));
        let shutdown = CancellationToken::new();

        // Fast cadence so tests observe queued -> terminal quickly, and a
        // low flush threshold so partial progress is visible mid-job.
        let pool_config = ImportWorkerPoolConfig {
            worker_count: 2,
            poll_interval: Duration::from_millis(WORKER_POLL_INTERVAL_MS),
            progress_flush_every: 10,
            stale_claim_timeout: Duration::from_secs(600),
            max_attempts: 3,
        };
        let pool = Arc::new(ImportWorkerPool::new(
            jobs.clone(),
            history.clone(),
            progress.clone(),
            pool_config,
        ));
        let _worker_handles = pool.spawn(shutdown.clone());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            metrics_port: 0, // Metrics listener is not started by make_app
            requests_logging_level: RequestsLoggingLevel::None,
            max_upload_bytes: 8 * 1024 * 1024,
        };
        let state = ServerState::new(
            config,
            user_store.clone(),
            history.clone(),
            jobs,
            progress,
            spool_dir,
        );
        let app = make_app(state);

        // Spawn server in background task with graceful shutdown
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            user,
            second_user,
            user_store,
            history,
            _temp_dir: temp_dir,
            shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
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
        // Stops the HTTP server and the worker pool
        self.shutdown.cancel();
        // TempDir cleans up the databases and spool
    }
}
