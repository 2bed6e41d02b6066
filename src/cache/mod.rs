//! Cache Module
//!
//! Provides the expiring key/value cache, its store and its expiry queue.

mod entry;
mod expiring;
mod queue;
mod stats;
mod store;


// Re-export public types
pub use entry::{ExpiryMarker, MarkerId};
pub use expiring::ExpiringCache;
pub use queue::ExpiryQueue;
pub use stats::CacheStats;
pub use store::Store;

pub(crate) use expiring::CacheCore;
pub(crate) use stats::StatsRecorder;
