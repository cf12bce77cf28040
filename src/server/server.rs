use anyhow::Result;
use std::{
    path::PathBuf,
    sync::Arc,
    time::Instant,
};

use tokio_util::sync::CancellationToken;
use tracing::info;

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::history::HistoryStore;
use crate::import::{AccessGuard, ImportJobStore, ImportSubmission, ProgressStore};
use crate::playlist::PlaylistGenerator;
use crate::user::UserStore;

use super::import_routes::import_routes;
use super::metrics::metrics_handler;
use super::playlist_routes::playlist_routes;
use super::session::Session;
use super::state::ServerState;
use super::stats_routes::stats_routes;
use super::{log_requests, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime_seconds: u64,
    pub version: String,
    pub authenticated: bool,
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH")),
        authenticated: session.is_some(),
    };
    Json(stats)
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        user_store: Arc<dyn UserStore>,
        history: Arc<dyn HistoryStore>,
        jobs: Arc<dyn ImportJobStore>,
        progress: Arc<ProgressStore>,
        spool_dir: PathBuf,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            user_store,
            history: history.clone(),
            jobs: jobs.clone(),
            access_guard: Arc::new(AccessGuard::new(progress)),
            submission: Arc::new(ImportSubmission::new(jobs, spool_dir)),
            generator: Arc::new(PlaylistGenerator::new(history)),
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .nest("/v1/import", import_routes(state.config.max_upload_bytes))
        .nest("/v1/playlist", playlist_routes())
        .nest("/v1/stats", stats_routes())
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let config = state.config.clone();
    let app = make_app(state);
    let metrics_app: Router = Router::new().route("/metrics", get(metrics_handler));

    let api_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let metrics_listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.metrics_port)).await?;

    info!(
        "Listening on port {} (metrics on port {})",
        config.port, config.metrics_port
    );

    let metrics_shutdown = shutdown.clone();
    let metrics_server = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_app)
            .with_graceful_shutdown(metrics_shutdown.cancelled_owned())
            .await
    });

    axum::serve(api_listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    metrics_server.await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SqliteHistoryStore;
    use crate::import::SqliteImportJobStore;
    use crate::user::{AuthToken, SqliteUserStore};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state(spool_dir: &TempDir) -> ServerState {
        let user_store = Arc::new(SqliteUserStore::in_memory().unwrap());
        let history = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let jobs: Arc<dyn ImportJobStore> = Arc::new(SqliteImportJobStore::in_memory().unwrap());
        let progress = Arc::new(ProgressStore::new(jobs.clone()));
        ServerState::new(
            ServerConfig::default(),
            user_store,
            history,
            jobs,
            progress,
            spool_dir.path().to_path_buf(),
        )
    }

    fn seed_session(state: &ServerState) -> (usize, String) {
        let user_id = state.user_store.create_user("alice").unwrap();
        let token = AuthToken::issue(user_id);
        state.user_store.add_auth_token(&token).unwrap();
        (user_id, token.value.0)
    }

    #[tokio::test]
    async fn home_is_public() {
        let spool = TempDir::new().unwrap();
        let app = make_app(test_state(&spool));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let stats: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stats["authenticated"], serde_json::Value::Bool(false));
        assert!(stats["version"].as_str().is_some());
    }

    #[tokio::test]
    async fn responds_unauthorized_on_protected_routes() {
        let spool = TempDir::new().unwrap();
        let app = make_app(test_state(&spool));

        let protected_routes = vec![
            "/v1/import/status/7-abc123",
            "/v1/import/status",
            "/v1/import/jobs",
            "/v1/stats/top-tracks",
            "/v1/stats/summary",
        ];

        for route in protected_routes.into_iter() {
            println!("Trying route {}", route);
            let request = Request::builder().uri(route).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let request = Request::builder()
            .method("POST")
            .uri("/v1/playlist/generate")
            .header("content-type", "application/json")
            .body(Body::from("{\"algorithm\":\"random\"}"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_token_in_header_is_accepted() {
        let spool = TempDir::new().unwrap();
        let state = test_state(&spool);
        let (user_id, token) = seed_session(&state);
        let app = make_app(state);

        // Well formed id owned by the caller, but never submitted.
        let unknown_job = format!("/v1/import/status/import_{}_deadbeef", user_id);
        let request = Request::builder()
            .uri(&unknown_job)
            .header("Authorization", &token)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = Request::builder()
            .uri("/v1/import/status")
            .header("Authorization", &token)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
