//! Reaper Task
//!
//! Background thread that evicts entries as their expiry markers come due.
//!
//! The loop takes the soonest marker, evicts it if due, and otherwise puts it back
//! and sleeps until it is. The sleep starts only after re-checking, inside the wake
//! scope, that the marker is still the queue head; a writer that inserts a sooner
//! marker notifies inside the same scope, so the reaper either sees the new head or
//! receives the notification.

use std::hash::Hash;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, trace, warn};

use crate::cache::CacheCore;
use crate::clock::split_millis;
use crate::config::CacheConfig;
use crate::error::WaitError;

// == Reaper Health ==
/// Observable state of a cache's reaper thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaperHealth {
    /// Evicting entries as they expire
    Running,
    /// Stopped by shutdown
    Stopped,
    /// Stopped by an unrecoverable error; entries no longer expire
    Failed { reason: String },
}

impl ReaperHealth {
    pub fn is_running(&self) -> bool {
        matches!(self, ReaperHealth::Running)
    }
}

/// Result of one pass of the reaper loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// A due marker removed its value
    Evicted,
    /// A due marker no longer matched the stored value
    Stale,
    /// The reaper slept and was woken by timeout or notify
    Waited,
    /// The marker was put back but another marker became the head, or it came due
    /// before the wait started
    Rescheduled,
    /// Shutdown was requested
    Stopped,
}

// == Reaper ==
pub(crate) struct Reaper<K, V> {
    core: Arc<CacheCore<K, V>>,
    max_consecutive_interrupts: u32,
    consecutive_interrupts: u32,
}

impl<K, V> Reaper<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new(core: Arc<CacheCore<K, V>>, max_consecutive_interrupts: u32) -> Self {
        Self {
            core,
            max_consecutive_interrupts,
            consecutive_interrupts: 0,
        }
    }

    // == Attempt Expiry ==
    /// Runs one pass: take the soonest marker, then evict it or sleep until it is due.
    pub(crate) fn attempt_expiry(&self) -> Result<Step, WaitError> {
        let core = &*self.core;
        if core.is_stopping() {
            return Ok(Step::Stopped);
        }

        let Some(marker) = core.queue.take_min() else {
            return Ok(Step::Stopped);
        };

        let now = core.clock.now();
        if marker.is_due(now) {
            return Ok(if core.evict(&marker) {
                debug!(
                    marker = marker.id.get(),
                    expiry = marker.expiry,
                    now,
                    "evicted expired entry"
                );
                Step::Evicted
            } else {
                debug!(marker = marker.id.get(), "skipped stale marker");
                Step::Stale
            });
        }

        let id = marker.id;
        core.queue.insert(marker);

        let mut scope = core.wake_scope.lock();
        if core.is_stopping() {
            return Ok(Step::Stopped);
        }
        // A sooner marker may have arrived while this one was out of the queue
        let Some(head) = core.queue.peek().filter(|head| head.id == id) else {
            return Ok(Step::Rescheduled);
        };

        let remaining = head.remaining(core.clock.now());
        if remaining == 0 {
            return Ok(Step::Rescheduled);
        }

        let (millis, nanos) = split_millis(remaining);
        trace!(marker = id.get(), millis, nanos, "reaper waiting");
        core.waiter.wait(&mut scope, millis, nanos)?;
        Ok(Step::Waited)
    }

    // == Run ==
    /// Loops until shutdown or an unrecoverable wait error.
    pub(crate) fn run(mut self) {
        let core = Arc::clone(&self.core);
        let _guard = PanicGuard { core: &*core };
        info!("Reaper started");

        loop {
            match self.attempt_expiry() {
                Ok(Step::Stopped) => break,
                Ok(Step::Waited) => self.consecutive_interrupts = 0,
                Ok(_) => {}
                Err(WaitError::Interrupted) => {
                    core.stats.record_interrupted_wait();
                    self.consecutive_interrupts += 1;
                    if self.consecutive_interrupts > self.max_consecutive_interrupts {
                        let reason = format!(
                            "wait interrupted {} times in a row",
                            self.consecutive_interrupts
                        );
                        error!(%reason, "Reaper giving up, entries will no longer expire");
                        core.mark_failed(reason);
                        return;
                    }
                    warn!(
                        attempt = self.consecutive_interrupts,
                        "Reaper wait interrupted, retrying"
                    );
                }
                Err(WaitError::Unrecoverable(reason)) => {
                    error!(%reason, "Reaper failed, entries will no longer expire");
                    core.mark_failed(reason);
                    return;
                }
            }
        }

        core.mark_stopped();
        info!("Reaper stopped");
    }
}

/// Marks the reaper failed if its thread unwinds.
struct PanicGuard<'a, K, V> {
    core: &'a CacheCore<K, V>,
}

impl<K, V> Drop for PanicGuard<'_, K, V> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Reaper panicked, entries will no longer expire");
            self.core.mark_failed("reaper panicked".to_string());
        }
    }
}

// == Spawn ==
/// Spawns the reaper on a dedicated, named thread.
///
/// # Returns
/// The thread's JoinHandle, joined by the cache during shutdown.
pub(crate) fn spawn_reaper<K, V>(
    core: Arc<CacheCore<K, V>>,
    config: &CacheConfig,
) -> io::Result<JoinHandle<()>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let reaper = Reaper::new(core, config.max_consecutive_interrupts);
    thread::Builder::new()
        .name(config.reaper_thread_name.clone())
        .spawn(move || reaper.run())
}
