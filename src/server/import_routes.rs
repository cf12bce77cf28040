//! Import HTTP routes.
//!
//! Provides endpoints for:
//! - Submitting a listening history export
//! - Polling the status of a submitted job
//! - Listing the caller's recent jobs

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::warn;

use crate::import::{AccessDecision, FileUpload, ImportJob, SubmitError};
use crate::server::metrics::record_import_submitted;
use crate::server::session::Session;
use crate::server::state::{
    GuardedAccessGuard, GuardedImportJobStore, GuardedImportSubmission, ServerState,
};

use super::ErrorResponse;

const RECENT_JOBS_LIMIT: usize = 50;

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message.to_string() }),
    ).into_response()
}

fn submit_error_response(err: SubmitError) -> axum::response::Response {
    match err {
        SubmitError::MissingFile | SubmitError::InvalidFileType(_) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: err.to_string() }),
        ).into_response(),
        SubmitError::Spool(_) | SubmitError::Store(_) => {
            warn!("Failed to accept import submission: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: err.to_string() }),
            ).into_response()
        }
    }
}

/// POST / - Submit a history export for import (multipart/form-data)
async fn submit_export(
    session: Session,
    State(submission): State<GuardedImportSubmission>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut upload: Option<FileUpload> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "file" {
            let file_name = field.file_name().unwrap_or("upload.json").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            match field.bytes().await {
                Ok(bytes) => {
                    upload = Some(FileUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    })
                }
                Err(e) => {
                    warn!("Failed to read file data: {}", e);
                    return bad_request("Failed to read file");
                }
            }
        }
    }

    let upload = match upload {
        Some(u) => u,
        None => return submit_error_response(SubmitError::MissingFile),
    };

    match submission.submit(session.user_id, upload) {
        Ok(receipt) => {
            record_import_submitted();
            (StatusCode::ACCEPTED, Json(receipt)).into_response()
        }
        Err(e) => submit_error_response(e),
    }
}

/// GET /status/:job_id - Poll the status of a submitted job
async fn job_status(
    session: Session,
    State(guard): State<GuardedAccessGuard>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let job_id = job_id.trim();
    if job_id.is_empty() {
        return bad_request("missing job id");
    }

    match guard.authorize(session.user_id, job_id) {
        Ok(AccessDecision::Allowed(snapshot)) => Json(snapshot).into_response(),
        Ok(AccessDecision::Forbidden) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse { error: "forbidden".to_string() }),
        ).into_response(),
        Ok(AccessDecision::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: "no such import job".to_string() }),
        ).into_response(),
        Err(e) => {
            warn!("Failed to read status of job {}: {}", job_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: "Failed to get job".to_string() }),
            ).into_response()
        }
    }
}

/// GET /status - Catch polls that forgot the job id
async fn job_status_missing_id(_session: Session) -> impl IntoResponse {
    bad_request("missing job id")
}

/// GET /jobs - List the caller's recent jobs, newest first
async fn list_jobs(
    session: Session,
    State(jobs): State<GuardedImportJobStore>,
) -> impl IntoResponse {
    match jobs.list_for_user(session.user_id, RECENT_JOBS_LIMIT) {
        Ok(jobs) => {
            let snapshots: Vec<_> = jobs.iter().map(ImportJob::snapshot).collect();
            Json(snapshots).into_response()
        }
        Err(e) => {
            warn!("Failed to list jobs for user {}: {}", session.user_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: "Failed to list jobs".to_string() }),
            ).into_response()
        }
    }
}

/// Build the import routes.
///
/// All routes require a session:
/// - POST / - Submit an export file
/// - GET /status/:job_id - Poll job status
/// - GET /jobs - List recent jobs
pub fn import_routes(max_upload_bytes: usize) -> Router<ServerState> {
    let submit_route = Router::new()
        .route("/", post(submit_export))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    submit_route
        .route("/status/{job_id}", get(job_status))
        .route("/status", get(job_status_missing_id))
        .route("/jobs", get(list_jobs))
}
