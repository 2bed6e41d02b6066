//! Cache Statistics Module
//!
//! Tracks cache activity: hits, misses, evictions and reaper scheduling events.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful puts
    pub puts: u64,
    /// Number of gets that found a value
    pub hits: u64,
    /// Number of gets that found nothing
    pub misses: u64,
    /// Number of explicit removals that deleted a value
    pub removals: u64,
    /// Number of values removed by the reaper
    pub evictions: u64,
    /// Number of due markers skipped because their value had been replaced or removed
    pub stale_markers: u64,
    /// Number of puts that notified the reaper of a new soonest expiry
    pub wake_notifications: u64,
    /// Number of reaper waits that ended in an interruption
    pub interrupted_waits: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
    /// Current number of markers waiting in the expiry queue
    pub pending_markers: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no gets have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by the facade and the reaper.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    puts: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    removals: AtomicU64,
    evictions: AtomicU64,
    stale_markers: AtomicU64,
    wake_notifications: AtomicU64,
    interrupted_waits: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_marker(&self) {
        self.stale_markers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wake_notification(&self) {
        self.wake_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interrupted_wait(&self) {
        self.interrupted_waits.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Copies the counters into a [`CacheStats`] with the given sizes.
    pub fn snapshot(&self, total_entries: usize, pending_markers: usize) -> CacheStats {
        CacheStats {
            puts: self.puts.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            stale_markers: self.stale_markers.load(Ordering::Relaxed),
            wake_notifications: self.wake_notifications.load(Ordering::Relaxed),
            interrupted_waits: self.interrupted_waits.load(Ordering::Relaxed),
            total_entries,
            pending_markers,
        }
    }
}
