//! Two-tier progress tracking for import jobs.
//!
//! Snapshots live in a bounded in-memory cache backed by the durable job
//! store. Writes land in the store first so a crash never shows progress
//! that was not persisted; reads fall back to the store and re-warm the
//! cache when an entry was evicted.

use super::models::JobSnapshot;
use super::queue_store::ImportJobStore;
use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

const PROGRESS_CACHE_CAPACITY: usize = 512;

pub struct ProgressStore {
    cache: Mutex<SnapshotCache>,
    jobs: Arc<dyn ImportJobStore>,
}

impl ProgressStore {
    pub fn new(jobs: Arc<dyn ImportJobStore>) -> ProgressStore {
        Self::with_capacity(jobs, PROGRESS_CACHE_CAPACITY)
    }

    pub fn with_capacity(jobs: Arc<dyn ImportJobStore>, capacity: usize) -> ProgressStore {
        ProgressStore {
            cache: Mutex::new(SnapshotCache::new(capacity)),
            jobs,
        }
    }

    /// Persist a snapshot, then refresh the cached copy.
    pub fn write(&self, snapshot: &JobSnapshot) -> Result<()> {
        self.jobs.write_snapshot(snapshot)?;
        self.cache.lock().unwrap().put(snapshot.clone());
        Ok(())
    }

    /// Current snapshot for a job, if the job exists.
    pub fn read(&self, job_id: &str) -> Result<Option<JobSnapshot>> {
        if let Some(snapshot) = self.cache.lock().unwrap().get(job_id) {
            return Ok(Some(snapshot));
        }
        let Some(job) = self.jobs.get_job(job_id)? else {
            return Ok(None);
        };
        let snapshot = job.snapshot();
        self.cache.lock().unwrap().put(snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Drop the cached entry so the next read goes to the store. Used when
    /// a job row changes hands outside the worker that cached it.
    pub fn invalidate(&self, job_id: &str) {
        self.cache.lock().unwrap().remove(job_id);
    }
}

/// FIFO-bounded snapshot cache.
struct SnapshotCache {
    capacity: usize,
    entries: HashMap<String, JobSnapshot>,
    order: VecDeque<String>,
}

impl SnapshotCache {
    fn new(capacity: usize) -> SnapshotCache {
        SnapshotCache {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn put(&mut self, snapshot: JobSnapshot) {
        let job_id = snapshot.job_id.clone();
        if self.entries.insert(job_id.clone(), snapshot).is_none() {
            self.order.push_back(job_id);
        }
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    fn get(&self, job_id: &str) -> Option<JobSnapshot> {
        self.entries.get(job_id).cloned()
    }

    fn remove(&mut self, job_id: &str) {
        self.entries.remove(job_id);
        self.order.retain(|id| id != job_id);
    }
}
