//! SQLite store for per-user play history.

use super::models::{DedupKey, HistoryEntry, ListeningSummary, PlayEvent, RankedTrack, TrackRef};
use super::schema::HISTORY_SCHEMA_SQL;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Trait for play-history storage operations.
pub trait HistoryStore: Send + Sync {
    /// Records a play. Returns false when a row with the same dedup key
    /// (user, track, minute bucket) already exists.
    fn insert_play(
        &self,
        user_id: usize,
        event: &PlayEvent,
        source_job_id: Option<&str>,
    ) -> Result<bool>;

    /// Whether a play with this dedup key is already recorded for the user.
    fn contains_play(&self, user_id: usize, key: &DedupKey) -> Result<bool>;

    /// Top tracks by play count, optionally restricted to plays at or after
    /// `played_since` (unix seconds). Ties break by most recent play, then
    /// by track key, so the ordering is fully deterministic.
    fn top_tracks(
        &self,
        user_id: usize,
        played_since: Option<i64>,
        limit: usize,
    ) -> Result<Vec<RankedTrack>>;

    /// Most recently played distinct tracks, most recent first, optionally
    /// bounded to plays within `[from, to]` (unix seconds, inclusive).
    fn recent_tracks(
        &self,
        user_id: usize,
        from: Option<i64>,
        to: Option<i64>,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>>;

    /// Aggregate listening stats for a user.
    fn summary(&self, user_id: usize) -> Result<ListeningSummary>;
}

/// SQLite implementation of HistoryStore.
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open or create a history database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open history database: {:?}", path))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(HISTORY_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(HISTORY_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<TrackRef> {
        Ok(TrackRef {
            key: row.get("track_key")?,
            name: row.get("track_name")?,
            artist: row.get("artist_name")?,
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn insert_play(
        &self,
        user_id: usize,
        event: &PlayEvent,
        source_job_id: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let key = event.dedup_key();
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO play_history (
                user_id, track_key, track_name, artist_name,
                played_at, played_minute, ms_played, source_job_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                user_id,
                key.track_key,
                event.track.name,
                event.track.artist,
                event.played_at.timestamp(),
                key.played_minute,
                event.ms_played,
                source_job_id,
                chrono::Utc::now().timestamp(),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn contains_play(&self, user_id: usize, key: &DedupKey) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM play_history WHERE user_id = ?1 AND track_key = ?2 AND played_minute = ?3",
            params![user_id, key.track_key, key.played_minute],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn top_tracks(
        &self,
        user_id: usize,
        played_since: Option<i64>,
        limit: usize,
    ) -> Result<Vec<RankedTrack>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT track_key, track_name, artist_name,
                   COUNT(*) AS play_count,
                   MAX(played_at) AS last_played_at
            FROM play_history
            WHERE user_id = ?1 AND (?2 IS NULL OR played_at >= ?2)
            GROUP BY track_key
            ORDER BY play_count DESC, last_played_at DESC, track_key ASC
            LIMIT ?3
            "#,
        )?;
        let tracks = stmt
            .query_map(params![user_id, played_since, limit as i64], |row| {
                Ok(RankedTrack {
                    track: Self::row_to_track(row)?,
                    play_count: row.get("play_count")?,
                    last_played_at: row.get("last_played_at")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    fn recent_tracks(
        &self,
        user_id: usize,
        from: Option<i64>,
        to: Option<i64>,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT track_key, track_name, artist_name,
                   MAX(played_at) AS last_played_at
            FROM play_history
            WHERE user_id = ?1
              AND (?2 IS NULL OR played_at >= ?2)
              AND (?3 IS NULL OR played_at <= ?3)
            GROUP BY track_key
            ORDER BY last_played_at DESC, track_key ASC
            LIMIT ?4
            "#,
        )?;
        let entries = stmt
            .query_map(params![user_id, from, to, limit as i64], |row| {
                Ok(HistoryEntry {
                    track: Self::row_to_track(row)?,
                    last_played_at: row.get("last_played_at")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn summary(&self, user_id: usize) -> Result<ListeningSummary> {
        let conn = self.conn.lock().unwrap();
        let summary = conn.query_row(
            r#"
            SELECT COUNT(*) AS total_plays,
                   COUNT(DISTINCT track_key) AS distinct_tracks,
                   MIN(played_at) AS first_played_at,
                   MAX(played_at) AS last_played_at
            FROM play_history
            WHERE user_id = ?1
            "#,
            params![user_id],
            |row| {
                Ok(ListeningSummary {
                    total_plays: row.get("total_plays")?,
                    distinct_tracks: row.get("distinct_tracks")?,
                    first_played_at: row.get("first_played_at")?,
                    last_played_at: row.get("last_played_at")?,
                })
            },
        )?;
        Ok(summary)
    }
}
