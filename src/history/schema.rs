//! SQLite schema for the play-history database.

pub const HISTORY_SCHEMA_VERSION: i32 = 1;

pub const HISTORY_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS play_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    track_key TEXT NOT NULL,
    track_name TEXT NOT NULL,
    artist_name TEXT NOT NULL,
    played_at INTEGER NOT NULL,                -- unix seconds
    played_minute INTEGER NOT NULL,            -- played_at / 60, dedup bucket
    ms_played INTEGER NOT NULL DEFAULT 0,
    source_job_id TEXT,                        -- import job that added this row, if any
    created_at INTEGER NOT NULL
);

-- At most one play per user, track and minute bucket. Re-imports rely on
-- this index for idempotency.
CREATE UNIQUE INDEX IF NOT EXISTS idx_play_history_dedup
    ON play_history(user_id, track_key, played_minute);

CREATE INDEX IF NOT EXISTS idx_play_history_user_time
    ON play_history(user_id, played_at);
"#;
