//! Expiring Map - An in-process key/value store with per-entry TTL
//!
//! Entries are removed by a background reaper thread as soon as their TTL elapses,
//! without any read or write having to trigger an expiry check.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod tasks;
pub mod waiter;

pub use cache::{CacheStats, ExpiringCache};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{CacheConfig, EvictionPolicy};
pub use error::{CacheError, Result, WaitError};
pub use tasks::ReaperHealth;
pub use waiter::{CondvarWaiter, Waiter, WakeScope};
