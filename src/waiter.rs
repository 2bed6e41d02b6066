//! Waiter Module
//!
//! The suspend/resume primitive the reaper sleeps on.
//!
//! Both sides of the protocol run while holding the cache's wake scope: the reaper
//! checks the queue head and then waits, a writer inserts a sooner marker and then
//! notifies. Because `wait` releases the scope atomically, a notify can never fall
//! between the reaper's check and its suspension.

use std::time::Duration;

use parking_lot::{Condvar, MutexGuard};

use crate::error::WaitError;

/// Guard proving the caller holds the cache's wake scope.
pub type WakeScope<'a> = MutexGuard<'a, ()>;

// == Waiter Trait ==
/// Lets the reaper block for a bounded time and writers wake it early.
pub trait Waiter: Send + Sync + 'static {
    /// Blocks for at most `millis` ms plus `nanos` ns, returning early if
    /// [`notify`](Waiter::notify) is called. The scope is released while blocked and
    /// held again on return.
    fn wait(&self, scope: &mut WakeScope<'_>, millis: u64, nanos: u32) -> Result<(), WaitError>;

    /// Wakes the waiting reaper, if any.
    fn notify(&self, scope: &WakeScope<'_>);
}

// == Condvar Waiter ==
/// Default waiter backed by a condition variable.
#[derive(Debug, Default)]
pub struct CondvarWaiter {
    condvar: Condvar,
}

impl CondvarWaiter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Waiter for CondvarWaiter {
    fn wait(&self, scope: &mut WakeScope<'_>, millis: u64, nanos: u32) -> Result<(), WaitError> {
        let timeout = Duration::from_millis(millis) + Duration::from_nanos(u64::from(nanos));
        // Spurious wakeups are fine, the reaper re-checks the clock
        let _ = self.condvar.wait_for(scope, timeout);
        Ok(())
    }

    fn notify(&self, _scope: &WakeScope<'_>) {
        self.condvar.notify_all();
    }
}
