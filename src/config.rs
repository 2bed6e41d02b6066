//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Decides what the reaper does with a due marker whose key has since been
/// overwritten or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Evict only if the stored value was written by the same `put` as the marker.
    #[default]
    Generational,
    /// Evict whatever is stored under the marker's key.
    Unconditional,
}

/// Returned when an eviction policy name is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown eviction policy: {0}")]
pub struct ParsePolicyError(String);

impl FromStr for EvictionPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generational" => Ok(EvictionPolicy::Generational),
            "unconditional" => Ok(EvictionPolicy::Unconditional),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::Generational => f.write_str("generational"),
            EvictionPolicy::Unconditional => f.write_str("unconditional"),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name given to the reaper thread
    pub reaper_thread_name: String,
    /// How due markers for overwritten or removed keys are handled
    pub eviction_policy: EvictionPolicy,
    /// Interrupted waits tolerated in a row before the reaper gives up
    pub max_consecutive_interrupts: u32,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REAPER_THREAD_NAME` - Reaper thread name (default: expiring-map-reaper)
    /// - `EVICTION_POLICY` - `generational` or `unconditional` (default: generational)
    /// - `MAX_CONSECUTIVE_INTERRUPTS` - Interrupt tolerance (default: 64)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            reaper_thread_name: env::var("REAPER_THREAD_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.reaper_thread_name),
            eviction_policy: env::var("EVICTION_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.eviction_policy),
            max_consecutive_interrupts: env::var("MAX_CONSECUTIVE_INTERRUPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_consecutive_interrupts),
        }
    }

    /// Sets the reaper thread name.
    pub fn with_reaper_thread_name(mut self, name: impl Into<String>) -> Self {
        self.reaper_thread_name = name.into();
        self
    }

    /// Sets the stale marker policy.
    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    /// Sets how many interrupted waits in a row the reaper tolerates.
    pub fn with_max_consecutive_interrupts(mut self, limit: u32) -> Self {
        self.max_consecutive_interrupts = limit;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reaper_thread_name: "expiring-map-reaper".to_string(),
            eviction_policy: EvictionPolicy::Generational,
            max_consecutive_interrupts: 64,
        }
    }
}
