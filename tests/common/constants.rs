//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When seeded users or timing budgets change, update only this file.

// ============================================================================
// Seeded Test Users
// ============================================================================

/// Handle of the primary seeded user
pub const TEST_USER_HANDLE: &str = "alice";

/// Handle of the secondary seeded user (for cross-user access tests)
pub const SECOND_USER_HANDLE: &str = "bob";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Worker queue poll interval used by test servers (milliseconds)
pub const WORKER_POLL_INTERVAL_MS: u64 = 25;

/// Maximum status polls while waiting for a job to finish
pub const JOB_TERMINAL_MAX_POLLS: usize = 400;

/// Interval between job status polls (milliseconds)
pub const JOB_POLL_INTERVAL_MS: u64 = 25;
