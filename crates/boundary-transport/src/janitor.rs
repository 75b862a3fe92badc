//! Bounded-cost table maintenance.
//!
//! The janitor is stepped once per loop iteration. Each time its interval
//! elapses it culls exactly one table, rotating through all four, so no
//! single step walks more than one table's capacity.

use tracing::debug;

use crate::router::Router;

/// The table a janitor step culls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullTarget {
    Paths,
    Links,
    Reverse,
    PendingRequests,
}

impl CullTarget {
    pub fn next(self) -> Self {
        match self {
            CullTarget::Paths => CullTarget::Links,
            CullTarget::Links => CullTarget::Reverse,
            CullTarget::Reverse => CullTarget::PendingRequests,
            CullTarget::PendingRequests => CullTarget::Paths,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Janitor {
    interval: u64,
    last_run: u64,
    next: CullTarget,
}

impl Janitor {
    /// A janitor whose first cull is due `interval` seconds after `now`.
    pub fn new(interval: u64, now: u64) -> Self {
        Self {
            interval,
            last_run: now,
            next: CullTarget::Paths,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// The table the next due step will cull.
    pub fn next_target(&self) -> CullTarget {
        self.next
    }

    /// Cull one table if the interval has elapsed. Returns the table and the
    /// number of entries removed.
    pub fn step(&mut self, router: &mut Router, now: u64) -> Option<(CullTarget, usize)> {
        if now < self.last_run.saturating_add(self.interval) {
            return None;
        }
        let target = self.next;
        let removed = match target {
            CullTarget::Paths => router.cull_paths(now),
            CullTarget::Links => router.cull_links(now),
            CullTarget::Reverse => router.cull_reverse(now),
            CullTarget::PendingRequests => router.cull_pending(now),
        };
        self.last_run = now;
        self.next = target.next();
        if removed > 0 {
            debug!(?target, removed, "janitor cull");
        }
        Some((target, removed))
    }
}
