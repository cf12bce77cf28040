//! Playlist HTTP routes.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use tracing::warn;

use crate::playlist::PlaylistRequest;
use crate::server::session::Session;
use crate::server::state::{GuardedPlaylistGenerator, ServerState};

use super::ErrorResponse;

/// POST /generate - Build a playlist from the caller's listening history
async fn generate_playlist(
    session: Session,
    State(generator): State<GuardedPlaylistGenerator>,
    Json(request): Json<PlaylistRequest>,
) -> impl IntoResponse {
    match generator.generate(session.user_id, request) {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            warn!(
                "Failed to generate playlist for user {}: {}",
                session.user_id, e
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: "Failed to generate playlist".to_string() }),
            )
                .into_response()
        }
    }
}

/// Build the playlist routes.
///
/// - POST /generate - Generate a playlist
pub fn playlist_routes() -> Router<ServerState> {
    Router::new().route("/generate", post(generate_playlist))
}
