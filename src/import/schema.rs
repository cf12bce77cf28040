//! SQLite schema for the import job database. One table doubles as the
//! durable work queue and the durable progress tier.

pub const IMPORT_JOBS_SCHEMA_VERSION: i32 = 1;

pub const IMPORT_JOBS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS import_jobs (
    job_id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued',     -- queued | processing | completed | failed
    source_path TEXT NOT NULL,                 -- spooled upload this job reads
    total_records INTEGER NOT NULL DEFAULT 0,
    processed_records INTEGER NOT NULL DEFAULT 0,
    added_records INTEGER NOT NULL DEFAULT 0,
    skipped_records INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,       -- claim count, bounded by max_attempts
    created_at INTEGER NOT NULL,               -- unix seconds
    claimed_at INTEGER,                        -- unix seconds of the latest claim
    finished_at INTEGER                        -- unix seconds of the terminal transition
);

-- Claim scans pick the oldest queued job first.
CREATE INDEX IF NOT EXISTS idx_import_jobs_status_created
    ON import_jobs(status, created_at);

CREATE INDEX IF NOT EXISTS idx_import_jobs_user
    ON import_jobs(user_id, created_at);
"#;
