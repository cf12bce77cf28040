//! Durable store for import jobs: queue claims, progress snapshots and
//! stale-claim recovery.

use super::models::{ImportCounters, ImportJob, ImportStatus, JobId, JobSnapshot, StaleSweep};
use super::schema::IMPORT_JOBS_SCHEMA_SQL;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Error message written to jobs whose workers died too many times.
pub const WORKER_LOST_ERROR: &str = "import worker lost; retry budget exhausted";

/// Trait for import job storage operations.
pub trait ImportJobStore: Send + Sync {
    /// Enqueue a new job row.
    fn enqueue(&self, job: &ImportJob) -> Result<()>;

    /// Get a job by id.
    fn get_job(&self, job_id: &str) -> Result<Option<ImportJob>>;

    /// Claim the oldest queued job: flips it to `processing`, stamps the
    /// claim time and bumps the attempt count. Returns None when nothing is
    /// queued. The guarded status transition means a job is only ever held
    /// by one worker at a time.
    fn claim_next(&self) -> Result<Option<ImportJob>>;

    /// Write a full progress snapshot (status plus all four counters) in a
    /// single statement. Errors when the job does not exist.
    fn write_snapshot(&self, snapshot: &JobSnapshot) -> Result<()>;

    /// Requeue `processing` jobs claimed before `stale_before` (unix
    /// seconds). Jobs already at `max_attempts` claims are failed instead.
    fn requeue_stale(&self, stale_before: i64, max_attempts: u32) -> Result<StaleSweep>;

    /// Recent jobs for a user, newest first.
    fn list_for_user(&self, user_id: usize, limit: usize) -> Result<Vec<ImportJob>>;
}

/// SQLite implementation of ImportJobStore.
pub struct SqliteImportJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteImportJobStore {
    /// Open or create an import job database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open import job database: {:?}", path))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(IMPORT_JOBS_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(IMPORT_JOBS_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<ImportJob> {
        let raw_id: String = row.get("job_id")?;
        let job_id = JobId::parse(&raw_id)
            .ok_or_else(|| invalid_column(format!("malformed job id: {}", raw_id)))?;
        let raw_status: String = row.get("status")?;
        let status = ImportStatus::parse(&raw_status)
            .ok_or_else(|| invalid_column(format!("unknown import status: {}", raw_status)))?;
        Ok(ImportJob {
            job_id,
            status,
            source_path: PathBuf::from(row.get::<_, String>("source_path")?),
            counters: ImportCounters {
                total_records: row.get("total_records")?,
                processed_records: row.get("processed_records")?,
                added_records: row.get("added_records")?,
                skipped_records: row.get("skipped_records")?,
            },
            error_message: row.get("error_message")?,
            attempts: row.get("attempts")?,
            created_at: row.get("created_at")?,
            claimed_at: row.get("claimed_at")?,
            finished_at: row.get("finished_at")?,
        })
    }
}

fn invalid_column(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, message.into())
}

impl ImportJobStore for SqliteImportJobStore {
    fn enqueue(&self, job: &ImportJob) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO import_jobs (
                job_id, user_id, status, source_path,
                total_records, processed_records, added_records, skipped_records,
                error_message, attempts, created_at, claimed_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                job.job_id.to_string(),
                job.user_id(),
                job.status.as_str(),
                job.source_path.to_string_lossy(),
                job.counters.total_records,
                job.counters.processed_records,
                job.counters.added_records,
                job.counters.skipped_records,
                job.error_message,
                job.attempts,
                job.created_at,
                job.claimed_at,
                job.finished_at,
            ],
        )?;
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<ImportJob>> {
        let conn = self.conn.lock().unwrap();
        let job = conn
            .query_row(
                "SELECT * FROM import_jobs WHERE job_id = ?1",
                params![job_id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    fn claim_next(&self) -> Result<Option<ImportJob>> {
        let conn = self.conn.lock().unwrap();
        let candidate: Option<String> = conn
            .query_row(
                "SELECT job_id FROM import_jobs WHERE status = ?1 ORDER BY created_at ASC, job_id ASC LIMIT 1",
                params![ImportStatus::Queued.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(job_id) = candidate else {
            return Ok(None);
        };

        // Guarded on status; a lost race shows up as zero updated rows.
        let updated = conn.execute(
            r#"
            UPDATE import_jobs
            SET status = ?1, claimed_at = ?2, attempts = attempts + 1
            WHERE job_id = ?3 AND status = ?4
            "#,
            params![
                ImportStatus::Processing.as_str(),
                chrono::Utc::now().timestamp(),
                job_id,
                ImportStatus::Queued.as_str(),
            ],
        )?;
        if updated == 0 {
            return Ok(None);
        }

        let job = conn.query_row(
            "SELECT * FROM import_jobs WHERE job_id = ?1",
            params![job_id],
            Self::row_to_job,
        )?;
        Ok(Some(job))
    }

    fn write_snapshot(&self, snapshot: &JobSnapshot) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let finished_at = snapshot
            .status
            .is_terminal()
            .then(|| chrono::Utc::now().timestamp());
        let updated = conn.execute(
            r#"
            UPDATE import_jobs
            SET status = ?1,
                total_records = ?2, processed_records = ?3,
                added_records = ?4, skipped_records = ?5,
                error_message = ?6,
                finished_at = COALESCE(finished_at, ?7)
            WHERE job_id = ?8
            "#,
            params![
                snapshot.status.as_str(),
                snapshot.counters.total_records,
                snapshot.counters.processed_records,
                snapshot.counters.added_records,
                snapshot.counters.skipped_records,
                snapshot.error_message,
                finished_at,
                snapshot.job_id,
            ],
        )?;
        if updated == 0 {
            bail!("No import job {} to update", snapshot.job_id);
        }
        Ok(())
    }

    fn requeue_stale(&self, stale_before: i64, max_attempts: u32) -> Result<StaleSweep> {
        let conn = self.conn.lock().unwrap();
        let stale: Vec<(String, u32)> = {
            let mut stmt = conn.prepare(
                r#"
                SELECT job_id, attempts FROM import_jobs
                WHERE status = ?1 AND claimed_at IS NOT NULL AND claimed_at < ?2
                ORDER BY claimed_at ASC
                "#,
            )?;
            let rows = stmt
                .query_map(
                    params![ImportStatus::Processing.as_str(), stale_before],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut sweep = StaleSweep::default();
        for (job_id, attempts) in stale {
            if attempts >= max_attempts {
                conn.execute(
                    "UPDATE import_jobs SET status = ?1, error_message = ?2, finished_at = ?3 WHERE job_id = ?4",
                    params![
                        ImportStatus::Failed.as_str(),
                        WORKER_LOST_ERROR,
                        chrono::Utc::now().timestamp(),
                        job_id,
                    ],
                )?;
                sweep.failed.push(job_id);
            } else {
                conn.execute(
                    "UPDATE import_jobs SET status = ?1, claimed_at = NULL WHERE job_id = ?2",
                    params![ImportStatus::Queued.as_str(), job_id],
                )?;
                sweep.requeued.push(job_id);
            }
        }
        Ok(sweep)
    }

    fn list_for_user(&self, user_id: usize, limit: usize) -> Result<Vec<ImportJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM import_jobs WHERE user_id = ?1 ORDER BY created_at DESC, job_id DESC LIMIT ?2",
        )?;
        let jobs = stmt
            .query_map(params![user_id, limit as i64], Self::row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }
}
