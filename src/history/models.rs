use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds per dedup bucket: plays of the same track within the same minute
/// collapse into one history row.
pub const DEDUP_BUCKET_SECONDS: i64 = 60;

// Unit separator, cannot appear in sane track or artist names.
const KEY_SEPARATOR: char = '\u{1f}';

/// A track as referenced by history rows and playlists.
///
/// `key` is the stable identity: the provider track id when the export
/// carried one, otherwise artist name + track name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub key: String,
    pub name: String,
    pub artist: String,
}

impl TrackRef {
    pub fn new(name: String, artist: String, provider_id: Option<String>) -> TrackRef {
        let key = match provider_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => format!("{}{}{}", artist, KEY_SEPARATOR, name),
        };
        TrackRef { key, name, artist }
    }
}

/// A single play candidate produced by the import parser.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub track: TrackRef,
    pub played_at: DateTime<Utc>,
    pub ms_played: i64,
}

impl PlayEvent {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            track_key: self.track.key.clone(),
            played_minute: self.played_at.timestamp() / DEDUP_BUCKET_SECONDS,
        }
    }
}

/// Identity of a play for dedup purposes: track plus minute bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub track_key: String,
    pub played_minute: i64,
}

/// A track ranked by play count within some time range.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RankedTrack {
    pub track: TrackRef,
    pub play_count: u64,
    /// Unix seconds of the most recent play.
    pub last_played_at: i64,
}

/// Entry in a user's recent-plays listing, one per distinct track.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub track: TrackRef,
    /// Unix seconds of the most recent play.
    pub last_played_at: i64,
}

/// Aggregate listening stats for a user.
#[derive(Serialize, Debug, Clone)]
pub struct ListeningSummary {
    pub total_plays: u64,
    pub distinct_tracks: u64,
    pub first_played_at: Option<i64>,
    pub last_played_at: Option<i64>,
}
