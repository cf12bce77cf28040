//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all rewound-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

/// HTTP test client carrying an optional session token
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    token: Option<String>,
}

impl TestClient {
    /// Creates a new unauthenticated client
    ///
    /// Use this for testing authentication rejections. For most tests, use
    /// `with_token()` with a token from the seeded test users instead.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Session cookies work too, tests mostly use the header
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Creates a client that sends the given session token on every request
    pub fn with_token(base_url: String, token: String) -> Self {
        let mut client = Self::new(base_url);
        client.token = Some(token);
        client
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", token),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(format!("{}{}", self.base_url, path)))
    }

    // ========================================================================
    // Home
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.get("/").send().await.expect("Home request failed")
    }

    // ========================================================================
    // Import Endpoints
    // ========================================================================

    /// POST /v1/import with an arbitrary file part
    pub async fn submit_file(&self, bytes: Vec<u8>, file_name: &str, content_type: &str) -> Response {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .expect("Invalid content type");
        let form = Form::new().part("file", part);

        self.post("/v1/import")
            .multipart(form)
            .send()
            .await
            .expect("Submit request failed")
    }

    /// POST /v1/import with a JSON export body
    pub async fn submit_export(&self, bytes: Vec<u8>) -> Response {
        self.submit_file(bytes, "export.json", "application/json")
            .await
    }

    /// POST /v1/import with a multipart form that has no file part
    pub async fn submit_without_file(&self) -> Response {
        let form = Form::new().text("note", "no file here");

        self.post("/v1/import")
            .multipart(form)
            .send()
            .await
            .expect("Submit request failed")
    }

    /// GET /v1/import/status/{job_id}
    pub async fn job_status(&self, job_id: &str) -> Response {
        self.get(&format!("/v1/import/status/{}", job_id))
            .send()
            .await
            .expect("Status request failed")
    }

    /// GET /v1/import/status (without a job id)
    pub async fn job_status_without_id(&self) -> Response {
        self.get("/v1/import/status")
            .send()
            .await
            .expect("Status request failed")
    }

    /// GET /v1/import/jobs
    pub async fn list_jobs(&self) -> Response {
        self.get("/v1/import/jobs")
            .send()
            .await
            .expect("Jobs request failed")
    }

    /// Submits an export and returns the job id from the 202 receipt
    pub async fn submit_export_expecting_job(&self, bytes: Vec<u8>) -> String {
        let response = self.submit_export(bytes).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::ACCEPTED,
            "Submission was not accepted"
        );
        let receipt: Value = response.json().await.expect("Receipt was not JSON");
        receipt["job_id"]
            .as_str()
            .expect("Receipt had no job_id")
            .to_string()
    }

    /// Polls job status until the job completes or fails, returning the
    /// final snapshot
    pub async fn wait_for_terminal(&self, job_id: &str) -> Value {
        for _ in 0..JOB_TERMINAL_MAX_POLLS {
            let response = self.job_status(job_id).await;
            assert_eq!(
                response.status(),
                reqwest::StatusCode::OK,
                "Status poll for {} failed",
                job_id
            );
            let snapshot: Value = response.json().await.expect("Snapshot was not JSON");
            match snapshot["status"].as_str() {
                Some("completed") | Some("failed") => return snapshot,
                _ => tokio::time::sleep(Duration::from_millis(JOB_POLL_INTERVAL_MS)).await,
            }
        }
        panic!("Job {} did not reach a terminal status", job_id);
    }

    // ========================================================================
    // Playlist Endpoints
    // ========================================================================

    /// POST /v1/playlist/generate
    pub async fn generate_playlist(&self, body: &Value) -> Response {
        self.post("/v1/playlist/generate")
            .json(body)
            .send()
            .await
            .expect("Playlist request failed")
    }

    // ========================================================================
    // Stats Endpoints
    // ========================================================================

    /// GET /v1/stats/top-tracks, optionally with a range
    pub async fn top_tracks(&self, range: Option<&str>) -> Response {
        let path = match range {
            Some(range) => format!("/v1/stats/top-tracks?range={}", range),
            None => "/v1/stats/top-tracks".to_string(),
        };
        self.get(&path)
            .send()
            .await
            .expect("Top tracks request failed")
    }

    /// GET /v1/stats/summary
    pub async fn stats_summary(&self) -> Response {
        self.get("/v1/stats/summary")
            .send()
            .await
            .expect("Summary request failed")
    }
}
