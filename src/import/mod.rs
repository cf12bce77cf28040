//! Asynchronous bulk import of listening-history exports: job identity,
//! durable queue, streaming parser, dedup, two-tier progress and workers.

pub mod access;
pub mod dedup;
pub mod models;
pub mod parser;
pub mod progress;
pub mod queue_store;
pub mod schema;
pub mod submission;
pub mod worker;

pub use access::{AccessDecision, AccessGuard};
pub use models::{ImportCounters, ImportJob, ImportStatus, JobId, JobIdMinter, JobSnapshot};
pub use progress::ProgressStore;
pub use queue_store::{ImportJobStore, SqliteImportJobStore};
pub use submission::{FileUpload, ImportSubmission, SubmitError, SubmitReceipt};
pub use worker::{ImportWorkerPool, ImportWorkerPoolConfig};
