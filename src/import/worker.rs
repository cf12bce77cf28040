//! Worker pool draining the import job queue.
//!
//! Each worker claims one job at a time through the store's guarded status
//! transition, streams the spooled payload into the history store and
//! flushes progress snapshots as it goes. A watchdog task requeues jobs
//! whose claims went stale, so a crashed worker loses at most the tail of
//! its last flush interval.

use super::dedup::Deduplicator;
use super::models::{ImportCounters, ImportJob, ImportStatus, JobSnapshot};
use super::parser::{count_records, parse_record, JsonArrayReader, ParseError, ParsedRecord};
use super::progress::ProgressStore;
use super::queue_store::ImportJobStore;
use crate::history::HistoryStore;
use crate::server::metrics;
use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ImportWorkerPoolConfig {
    pub worker_count: usize,
    pub poll_interval: Duration,
    /// Flush a progress snapshot every this many processed records.
    pub progress_flush_every: u64,
    /// Claims older than this are considered lost and swept.
    pub stale_claim_timeout: Duration,
    /// Claims per job before a swept job is failed instead of requeued.
    pub max_attempts: u32,
}

impl Default for ImportWorkerPoolConfig {
    fn default() -> Self {
        ImportWorkerPoolConfig {
            worker_count: 2,
            poll_interval: Duration::from_secs(1),
            progress_flush_every: 500,
            stale_claim_timeout: Duration::from_secs(600),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Error)]
enum ImportError {
    #[error("import payload unavailable: {0}")]
    SourceUnavailable(std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("history store failure: {0}")]
    History(anyhow::Error),
}

pub struct ImportWorkerPool {
    jobs: Arc<dyn ImportJobStore>,
    history: Arc<dyn HistoryStore>,
    dedup: Deduplicator,
    progress: Arc<ProgressStore>,
    config: ImportWorkerPoolConfig,
}

impl ImportWorkerPool {
    pub fn new(
        jobs: Arc<dyn ImportJobStore>,
        history: Arc<dyn HistoryStore>,
        progress: Arc<ProgressStore>,
        config: ImportWorkerPoolConfig,
    ) -> ImportWorkerPool {
        ImportWorkerPool {
            dedup: Deduplicator::new(history.clone()),
            jobs,
            history,
            progress,
            config,
        }
    }

    /// Start the workers and the stale-claim watchdog. Tasks run until the
    /// token is cancelled; in-flight jobs finish before their worker exits.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.config.worker_count + 1);
        for worker_index in 0..self.config.worker_count {
            let pool = self.clone();
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_index, token).await;
            }));
        }
        let pool = self.clone();
        handles.push(tokio::spawn(async move {
            pool.watchdog_loop(shutdown).await;
        }));
        handles
    }

    async fn worker_loop(self: Arc<Self>, worker_index: usize, shutdown: CancellationToken) {
        info!("Import worker {} started", worker_index);
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match self.jobs.claim_next() {
                Ok(Some(job)) => {
                    let pool = self.clone();
                    let outcome =
                        tokio::task::spawn_blocking(move || pool.process_claimed(job)).await;
                    if let Err(err) = outcome {
                        error!("Import worker {} job task panicked: {}", worker_index, err);
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(err) => {
                    warn!("Import worker {} failed to poll queue: {:#}", worker_index, err);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }
        info!("Import worker {} stopped", worker_index);
    }

    async fn watchdog_loop(self: Arc<Self>, shutdown: CancellationToken) {
        // Claims orphaned by a previous process are swept before any new
        // work is taken.
        self.sweep_stale();
        let period = (self.config.stale_claim_timeout / 4).max(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(period) => self.sweep_stale(),
            }
        }
    }

    fn sweep_stale(&self) {
        let cutoff =
            chrono::Utc::now().timestamp() - self.config.stale_claim_timeout.as_secs() as i64;
        match self.jobs.requeue_stale(cutoff, self.config.max_attempts) {
            Ok(sweep) => {
                for job_id in &sweep.requeued {
                    warn!("Requeued stale import job {}", job_id);
                    self.progress.invalidate(job_id);
                    metrics::record_import_requeued();
                }
                for job_id in &sweep.failed {
                    warn!(
                        "Import job {} failed after {} lost claims",
                        job_id, self.config.max_attempts
                    );
                    self.progress.invalidate(job_id);
                }
            }
            Err(err) => warn!("Stale import claim sweep failed: {:#}", err),
        }
    }

    fn process_claimed(&self, job: ImportJob) {
        let job_id = job.job_id.to_string();
        let user_id = job.user_id();
        let started = Instant::now();
        info!("Importing job {} (attempt {})", job_id, job.attempts);

        // A retried job starts over from zero; counters carried across
        // attempts would double-count the records the lost worker got to.
        let mut snapshot = JobSnapshot {
            job_id: job_id.clone(),
            status: ImportStatus::Processing,
            counters: ImportCounters::default(),
            error_message: None,
        };
        self.flush(&snapshot);

        match self.run_import(user_id, &job, &mut snapshot) {
            Ok(()) => {
                snapshot.status = ImportStatus::Completed;
                info!(
                    "Import job {} completed in {:?}: {} added, {} skipped of {} records",
                    job_id,
                    started.elapsed(),
                    snapshot.counters.added_records,
                    snapshot.counters.skipped_records,
                    snapshot.counters.total_records,
                );
            }
            Err(err) => {
                snapshot.status = ImportStatus::Failed;
                snapshot.error_message = Some(err.to_string());
                warn!("Import job {} failed: {}", job_id, err);
            }
        }

        if let Err(err) = self.progress.write(&snapshot) {
            error!(
                "Could not write final snapshot for import job {}: {:#}",
                job_id, err
            );
        }
        metrics::record_import_finished(
            snapshot.status,
            &snapshot.counters,
            started.elapsed().as_secs_f64(),
        );

        if let Err(err) = std::fs::remove_file(&job.source_path) {
            debug!(
                "Could not remove spool file {:?} for job {}: {}",
                job.source_path, job_id, err
            );
        }
    }

    fn run_import(
        &self,
        user_id: usize,
        job: &ImportJob,
        snapshot: &mut JobSnapshot,
    ) -> Result<(), ImportError> {
        let file = File::open(&job.source_path).map_err(ImportError::SourceUnavailable)?;
        snapshot.counters.total_records = count_records(file)?;
        self.flush(snapshot);

        let file = File::open(&job.source_path).map_err(ImportError::SourceUnavailable)?;
        let mut reader = JsonArrayReader::new(file);
        let flush_every = self.config.progress_flush_every.max(1);

        while let Some(element) = reader.next_element()? {
            match parse_record(&element) {
                ParsedRecord::Event(event) => {
                    let duplicate = self
                        .dedup
                        .is_duplicate(user_id, &event)
                        .map_err(ImportError::History)?;
                    if duplicate {
                        snapshot.counters.record_skipped();
                    } else if self
                        .history
                        .insert_play(user_id, &event, Some(&snapshot.job_id))
                        .map_err(ImportError::History)?
                    {
                        snapshot.counters.record_added();
                    } else {
                        // Lost an insert race; the unique index already
                        // holds this play.
                        snapshot.counters.record_skipped();
                    }
                }
                ParsedRecord::Invalid(reason) => {
                    debug!("Skipping record in import job {}: {}", snapshot.job_id, reason);
                    snapshot.counters.record_skipped();
                }
            }
            if snapshot.counters.processed_records % flush_every == 0 {
                self.flush(snapshot);
            }
        }
        Ok(())
    }

    fn flush(&self, snapshot: &JobSnapshot) {
        if let Err(err) = self.progress.write(snapshot) {
            warn!(
                "Could not flush progress for import job {}: {:#}",
                snapshot.job_id, err
            );
        }
    }
}
