//! Clock Module
//!
//! Monotonic nanosecond time sources used to compute and check expiries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Nanoseconds since an arbitrary, fixed origin.
pub type Nanos = u64;

/// Number of nanoseconds in one millisecond.
pub const NANOS_PER_MILLI: u64 = 1_000_000;

// == Clock Trait ==
/// Source of monotonically non-decreasing timestamps.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current timestamp in nanoseconds.
    fn now(&self) -> Nanos;
}

// == Monotonic Clock ==
/// Platform monotonic clock, measured from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Nanos {
        // u64 nanoseconds covers ~584 years of uptime
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

// == Manual Clock ==
/// Clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep one handle and give another
/// to the cache.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start` nanoseconds.
    pub fn new(start: Nanos) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Sets the reading. Callers are responsible for never moving it backwards.
    pub fn set(&self, nanos: Nanos) {
        self.now.store(nanos, Ordering::SeqCst);
    }

    pub fn advance_nanos(&self, nanos: u64) {
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.advance_nanos(duration_to_nanos(by));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Nanos {
        self.now.load(Ordering::SeqCst)
    }
}

// == Utility Functions ==
/// Converts a millisecond TTL to nanoseconds, saturating on overflow.
pub fn millis_to_nanos(ms: u64) -> u64 {
    ms.saturating_mul(NANOS_PER_MILLI)
}

/// Converts a duration to nanoseconds, saturating on overflow.
pub fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Splits a nanosecond span into whole milliseconds and the nanosecond remainder.
pub fn split_millis(nanos: u64) -> (u64, u32) {
    // remainder is < 1_000_000 so it always fits in u32
    (nanos / NANOS_PER_MILLI, (nanos % NANOS_PER_MILLI) as u32)
}
