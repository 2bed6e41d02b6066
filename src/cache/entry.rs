//! Expiry Marker Module
//!
//! Defines the pending-eviction markers held in the expiry queue.

use std::cmp::Ordering;

use crate::clock::Nanos;

// == Marker Id ==
/// Identifies the `put` that produced a marker and the value it wrote.
///
/// Ids are handed out in increasing order per cache, so two markers never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(pub(crate) u64);

impl MarkerId {
    pub fn get(self) -> u64 {
        self.0
    }
}

// == Expiry Marker ==
/// One pending eviction obligation: remove `key` once the clock reaches `expiry`.
#[derive(Debug, Clone)]
pub struct ExpiryMarker<K> {
    /// Absolute expiry timestamp in nanoseconds
    pub expiry: Nanos,
    /// Key to evict
    pub key: K,
    /// Put that created this marker
    pub id: MarkerId,
}

impl<K> ExpiryMarker<K> {
    // == Constructor ==
    pub fn new(expiry: Nanos, key: K, id: MarkerId) -> Self {
        Self { expiry, key, id }
    }

    // == Is Due ==
    /// Checks if the marker has expired.
    ///
    /// Boundary condition: a marker is due once `now` is greater than or equal to its
    /// expiry, so an entry is gone as soon as its TTL has fully elapsed.
    pub fn is_due(&self, now: Nanos) -> bool {
        now >= self.expiry
    }

    // == Remaining ==
    /// Nanoseconds left until the marker is due, zero if it already is.
    pub fn remaining(&self, now: Nanos) -> Nanos {
        self.expiry.saturating_sub(now)
    }
}

// Ordered by expiry, ties broken by id so the order is total and stable.
impl<K> PartialEq for ExpiryMarker<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.expiry == other.expiry
    }
}

impl<K> Eq for ExpiryMarker<K> {}

impl<K> PartialOrd for ExpiryMarker<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for ExpiryMarker<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expiry
            .cmp(&other.expiry)
            .then_with(|| self.id.cmp(&other.id))
    }
}
