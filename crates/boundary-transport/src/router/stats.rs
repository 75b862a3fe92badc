//! Router counters.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub packets_bridged_narrow_to_boundary: u64,
    pub packets_bridged_boundary_to_narrow: u64,
    /// Time of the last packet bridged in either direction.
    pub last_bridge_activity: Option<u64>,
    pub duplicates_dropped: u64,
    pub malformed_dropped: u64,
    /// Entries evicted from any bounded table to make room.
    pub evictions: u64,
    pub announces_cached: u64,
    pub path_requests_suppressed: u64,
    pub links_validated: u64,
}

impl fmt::Display for RouterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "narrow->boundary={} boundary->narrow={} dup={} malformed={} evicted={} cached={} suppressed={} links={}",
            self.packets_bridged_narrow_to_boundary,
            self.packets_bridged_boundary_to_narrow,
            self.duplicates_dropped,
            self.malformed_dropped,
            self.evictions,
            self.announces_cached,
            self.path_requests_suppressed,
            self.links_validated,
        )
    }
}
