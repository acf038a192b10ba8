//! Shared constants for end-to-end tests
//!
//! When test users or post ids change, update only this file.

// ============================================================================
// Test Principals
// ============================================================================

/// Owner used by most tests
pub const ALICE: &str = "alice";

/// A second owner, used to exercise ownership checks
pub const BOB: &str = "bob";

/// Permission aliases granting every operation
pub const ALL_PERMISSIONS: &str = "crud";

/// Permission aliases of a read-only principal
pub const READ_ONLY: &str = "r";

// ============================================================================
// Post Service Fixtures
// ============================================================================

/// Post ids the stub post service knows about
pub const POST_1_ID: &str = "post-1";
pub const POST_2_ID: &str = "post-2";
pub const POST_3_ID: &str = "post-3";

/// Post id the stub post service has never heard of
pub const UNKNOWN_POST_ID: &str = "post-unknown";

/// Name the stub post service reports for a known post
pub fn post_name(id: &str) -> String {
    format!("Title of {}", id)
}

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the test servers to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness polls
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Timeout of each request made by the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Timeout the bookmark server uses for post service calls
pub const POST_SERVICE_TIMEOUT_SECS: u64 = 2;

/// Page size configured on the test server
pub const TEST_PER_PAGE: usize = 2;
