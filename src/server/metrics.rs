use crate::import::{ImportCounters, ImportStatus};
use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Rewound metrics
const PREFIX: &str = "rewound";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Import Pipeline Metrics
    pub static ref IMPORT_JOBS_SUBMITTED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_import_jobs_submitted_total"),
        "Import jobs accepted and enqueued"
    ).expect("Failed to create import_jobs_submitted_total metric");

    pub static ref IMPORT_JOBS_FINISHED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_import_jobs_finished_total"),
            "Import jobs reaching a terminal status"
        ),
        &["status"]
    ).expect("Failed to create import_jobs_finished_total metric");

    pub static ref IMPORT_JOBS_REQUEUED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_import_jobs_requeued_total"),
        "Stale import job claims returned to the queue"
    ).expect("Failed to create import_jobs_requeued_total metric");

    pub static ref IMPORT_RECORDS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_import_records_total"),
            "Processed import records by outcome"
        ),
        &["outcome"]
    ).expect("Failed to create import_records_total metric");

    pub static ref IMPORT_JOB_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_import_job_duration_seconds"),
            "Wall time of a single import job"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0])
    ).expect("Failed to create import_job_duration_seconds metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(IMPORT_JOBS_SUBMITTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(IMPORT_JOBS_FINISHED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(IMPORT_JOBS_REQUEUED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(IMPORT_RECORDS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(IMPORT_JOB_DURATION_SECONDS.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record an accepted import submission
pub fn record_import_submitted() {
    IMPORT_JOBS_SUBMITTED_TOTAL.inc();
}

/// Record a finished import job with its final counters
pub fn record_import_finished(status: ImportStatus, counters: &ImportCounters, seconds: f64) {
    IMPORT_JOBS_FINISHED_TOTAL
        .with_label_values(&[status.as_str()])
        .inc();
    IMPORT_RECORDS_TOTAL
        .with_label_values(&["added"])
        .inc_by(counters.added_records as f64);
    IMPORT_RECORDS_TOTAL
        .with_label_values(&["skipped"])
        .inc_by(counters.skipped_records as f64);
    IMPORT_JOB_DURATION_SECONDS.observe(seconds);
}

/// Record a stale claim returned to the queue
pub fn record_import_requeued() {
    IMPORT_JOBS_REQUEUED_TOTAL.inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
