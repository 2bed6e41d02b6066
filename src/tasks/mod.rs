//! Background Tasks Module
//!
//! Contains the background work each cache runs for its lifetime.
//!
//! # Tasks
//! - Reaper: evicts entries as their expiry markers come due

mod reaper;

pub use reaper::ReaperHealth;
pub(crate) use reaper::spawn_reaper;
