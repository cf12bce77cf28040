//! Ownership checks for import status polls.

use super::models::{JobId, JobSnapshot};
use super::progress::ProgressStore;
use anyhow::Result;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    Allowed(JobSnapshot),
    Forbidden,
    NotFound,
}

/// Gatekeeper between a session and a job snapshot.
///
/// Ownership is decided from the id alone, before any lookup, so a caller
/// probing foreign job ids always gets the same answer whether or not the
/// job exists. Unparseable ids read as not found.
pub struct AccessGuard {
    progress: Arc<ProgressStore>,
}

impl AccessGuard {
    pub fn new(progress: Arc<ProgressStore>) -> AccessGuard {
        AccessGuard { progress }
    }

    pub fn authorize(&self, requesting_user_id: usize, raw_job_id: &str) -> Result<AccessDecision> {
        let Some(job_id) = JobId::parse(raw_job_id) else {
            return Ok(AccessDecision::NotFound);
        };
        if job_id.user_id() != requesting_user_id {
            return Ok(AccessDecision::Forbidden);
        }
        match self.progress.read(raw_job_id)? {
            Some(snapshot) => Ok(AccessDecision::Allowed(snapshot)),
            None => Ok(AccessDecision::NotFound),
        }
    }
}
