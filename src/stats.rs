//! Per-group lookup counters.
//!
//! Counters are relaxed atomics bumped on the hot path and read through
//! [`GroupStats::snapshot`], which the stats endpoint serializes. They are
//! advisory: individually accurate, not mutually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A monotonically increasing event counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub(crate) fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Live counters for one cache group, one per lookup-protocol stage.
#[derive(Debug, Default)]
pub struct GroupStats {
    /// Every Get, before validation.
    pub gets: Counter,
    /// Gets answered from the local store.
    pub cache_hits: Counter,
    /// Gets that missed locally and entered the load path.
    pub loads: Counter,
    /// Loads that actually executed after coalescing.
    pub loads_deduped: Counter,
    /// Values produced by this process's loader.
    pub local_loads: Counter,
    /// Loader invocations that returned an error.
    pub local_load_errors: Counter,
    /// Values fetched from a remote peer.
    pub peer_loads: Counter,
    /// Failed remote fetches (each one falls back to the local loader).
    pub peer_errors: Counter,
}

impl GroupStats {
    /// A point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.get(),
            cache_hits: self.cache_hits.get(),
            loads: self.loads.get(),
            loads_deduped: self.loads_deduped.get(),
            local_loads: self.local_loads.get(),
            local_load_errors: self.local_load_errors.get(),
            peer_loads: self.peer_loads.get(),
            peer_errors: self.peer_errors.get(),
        }
    }
}

/// Serializable snapshot of [`GroupStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub gets: u64,
    pub cache_hits: u64,
    pub loads: u64,
    pub loads_deduped: u64,
    pub local_loads: u64,
    pub local_load_errors: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
}
