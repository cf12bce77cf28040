//! Listening statistics HTTP routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use crate::playlist::{StatsRange, TOP_TRACKS_LIMIT};
use crate::server::session::Session;
use crate::server::state::{GuardedHistoryStore, ServerState};

use super::ErrorResponse;

#[derive(Debug, Deserialize)]
struct TopTracksQuery {
    #[serde(default)]
    range: StatsRange,
}

/// GET /top-tracks - Most played tracks over a range, play counts included
async fn top_tracks(
    session: Session,
    State(history): State<GuardedHistoryStore>,
    Query(query): Query<TopTracksQuery>,
) -> impl IntoResponse {
    let played_since = query.range.cutoff(Utc::now());
    match history.top_tracks(session.user_id, played_since, TOP_TRACKS_LIMIT) {
        Ok(ranked) => Json(ranked).into_response(),
        Err(e) => {
            warn!(
                "Failed to rank tracks for user {}: {}",
                session.user_id, e
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: "Failed to rank tracks".to_string() }),
            )
                .into_response()
        }
    }
}

/// GET /summary - Totals and first/last play timestamps
async fn summary(
    session: Session,
    State(history): State<GuardedHistoryStore>,
) -> impl IntoResponse {
    match history.summary(session.user_id) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            warn!(
                "Failed to summarize history for user {}: {}",
                session.user_id, e
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: "Failed to summarize history".to_string() }),
            )
                .into_response()
        }
    }
}

/// Build the stats routes.
///
/// - GET /top-tracks?range= - Ranked play counts
/// - GET /summary - Listening totals
pub fn stats_routes() -> Router<ServerState> {
    Router::new()
        .route("/top-tracks", get(top_tracks))
        .route("/summary", get(summary))
}
