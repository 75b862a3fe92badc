//! Router constants.

/// Reverse table entry timeout (8 minutes).
pub const REVERSE_TIMEOUT: u64 = 8 * 60;

/// Seconds allowed per hop for a link proof to come back.
pub const ESTABLISHMENT_TIMEOUT_PER_HOP: u64 = 6;

/// Inactivity timeout for a validated link (STALE_TIME 720 s x 1.25).
pub const LINK_TIMEOUT: u64 = 900;

pub const PATH_TABLE_CAPACITY: usize = 128;
pub const LINK_TABLE_CAPACITY: usize = 32;
pub const REVERSE_TABLE_CAPACITY: usize = 64;
pub const PENDING_REQUEST_CAPACITY: usize = 16;
pub const PATH_REQUEST_TRACKER_CAPACITY: usize = 32;
