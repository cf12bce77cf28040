//! Intake for uploaded history exports: validate, spool to disk, enqueue.

use super::models::{ImportJob, JobIdMinter};
use super::queue_store::ImportJobStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// An uploaded file as extracted from the multipart form.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no file in upload")]
    MissingFile,
    #[error("unsupported file type: {0}, expected application/json")]
    InvalidFileType(String),
    #[error("failed to spool upload")]
    Spool(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// What the submitter gets back: the job id and where to poll it.
#[derive(Serialize, Debug, Clone)]
pub struct SubmitReceipt {
    pub message: String,
    pub job_id: String,
    pub status_url: String,
}

pub struct ImportSubmission {
    jobs: Arc<dyn ImportJobStore>,
    minter: JobIdMinter,
    spool_dir: PathBuf,
}

impl ImportSubmission {
    pub fn new(jobs: Arc<dyn ImportJobStore>, spool_dir: PathBuf) -> ImportSubmission {
        ImportSubmission {
            jobs,
            minter: JobIdMinter::new(),
            spool_dir,
        }
    }

    /// Validates an upload and enqueues an import job for it. Rejected
    /// uploads leave no job and no spool file behind.
    pub fn submit(&self, user_id: usize, upload: FileUpload) -> Result<SubmitReceipt, SubmitError> {
        if upload.bytes.is_empty() {
            return Err(SubmitError::MissingFile);
        }
        if !is_json_content_type(upload.content_type.as_deref()) {
            return Err(SubmitError::InvalidFileType(
                upload
                    .content_type
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| "unknown".to_string()),
            ));
        }

        let job_id = self.minter.mint(user_id);
        let source_path = self.spool_dir.join(format!("{}.json", job_id));
        std::fs::write(&source_path, &upload.bytes)?;

        let job = ImportJob::new(job_id.clone(), source_path.clone());
        if let Err(err) = self.jobs.enqueue(&job) {
            let _ = std::fs::remove_file(&source_path);
            return Err(SubmitError::Store(err));
        }

        info!(
            "Enqueued import job {} for user {} ({} bytes, file {:?})",
            job_id,
            user_id,
            upload.bytes.len(),
            upload.file_name,
        );
        Ok(SubmitReceipt {
            message: "import accepted".to_string(),
            job_id: job_id.to_string(),
            status_url: format!("/v1/import/status/{}", job_id),
        })
    }
}

/// Accepts `application/json` and `text/json`, with or without parameters
/// like `; charset=utf-8`. A missing content type is rejected.
fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    mime.eq_ignore_ascii_case("application/json") || mime.eq_ignore_ascii_case("text/json")
}
