//! Error types for the expiring map
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// TTL was negative; nothing was stored
    #[error("Invalid TTL: {0}ms, timeout must be a positive value")]
    InvalidTtl(i64),

    /// The reaper died, so new entries would never expire
    #[error("Reaper failed: {0}")]
    ReaperFailed(String),

    /// The cache has been shut down
    #[error("Cache has been shut down")]
    ShutDown,

    /// The reaper thread could not be started
    #[error("Failed to spawn reaper thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// == Wait Error Enum ==
/// Errors reported by a [`Waiter`](crate::Waiter) while suspending the reaper.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The wait ended for an unexpected reason; the reaper retries.
    #[error("wait interrupted")]
    Interrupted,

    /// The waiter cannot be used any more; the reaper stops and reports failure.
    #[error("waiter unavailable: {0}")]
    Unrecoverable(String),
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
