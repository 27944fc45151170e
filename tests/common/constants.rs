//! Shared constants for integration tests
//!
//! When test credentials or timings change, update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Admin test user handle. Registered first, so it gets admin rights.
pub const ADMIN_USER: &str = "admin";

/// Admin test user password
pub const ADMIN_PASS: &str = "adminpass123";

/// Regular test user handle
pub const TEST_USER: &str = "testuser";

/// Regular test user password
pub const TEST_PASS: &str = "testpass123";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Timeout for a single HTTP request (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Audio Fixtures
// ============================================================================

/// Sample rate written into synthesized FLAC stream info
pub const FIXTURE_SAMPLE_RATE: u32 = 44_100;
