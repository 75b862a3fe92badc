//! Path table constants.

/// Default path expiration time (7 days in seconds).
pub const PATHFINDER_E: u64 = 60 * 60 * 24 * 7;

/// Access Point path time (24 hours in seconds).
pub const AP_PATH_TIME: u64 = 60 * 60 * 24;

/// Roaming path time (6 hours in seconds).
pub const ROAMING_PATH_TIME: u64 = 60 * 60 * 6;

/// Minimum interval between router-originated path requests for one
/// destination (seconds).
pub const PATH_REQUEST_MI: u64 = 20;

/// How long a forwarded path request waits for a backbone answer (seconds).
pub const PATH_REQUEST_TIMEOUT: u64 = 30;
