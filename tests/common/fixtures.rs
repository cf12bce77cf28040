//! Export payloads and seeded users for end-to-end tests
//!
//! When the export formats accepted by the importer change, update only
//! this file.

use rewound_server::user::{AuthToken, UserStore};
use serde_json::{json, Value};

/// A seeded user with a ready-to-use session token.
pub struct TestUser {
    pub id: usize,
    pub handle: String,
    pub token: String,
}

/// Creates a user and issues a session token for it.
pub fn seed_user(user_store: &dyn UserStore, handle: &str) -> TestUser {
    let id = user_store
        .create_user(handle)
        .expect("Failed to create test user");
    let token = AuthToken::issue(id);
    user_store
        .add_auth_token(&token)
        .expect("Failed to store auth token");
    TestUser {
        id,
        handle: handle.to_string(),
        token: token.value.0,
    }
}

/// One record in the simple account-export format.
///
/// `end_time` is the naive `YYYY-MM-DD HH:MM` form, e.g. `"2024-03-01 17:30"`.
pub fn simple_record(track: &str, artist: &str, end_time: &str, ms_played: i64) -> Value {
    json!({
        "endTime": end_time,
        "artistName": artist,
        "trackName": track,
        "msPlayed": ms_played,
    })
}

/// One record in the extended streaming-history format, carrying a stable
/// provider track URI.
///
/// `ts` is RFC 3339, e.g. `"2024-03-01T17:30:00Z"`.
pub fn extended_record(track: &str, artist: &str, ts: &str, ms_played: i64, uri: &str) -> Value {
    json!({
        "ts": ts,
        "master_metadata_album_artist_name": artist,
        "master_metadata_track_name": track,
        "ms_played": ms_played,
        "spotify_track_uri": uri,
    })
}

/// Serializes records into an upload body.
pub fn export_bytes(records: &[Value]) -> Vec<u8> {
    serde_json::to_vec(&Value::Array(records.to_vec())).expect("Failed to serialize export")
}
