//! Expiring Cache Module
//!
//! Public facade combining the store, the expiry queue and the reaper thread.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, ExpiryMarker, ExpiryQueue, MarkerId, StatsRecorder, Store};
use crate::clock::{duration_to_nanos, millis_to_nanos, Clock, MonotonicClock};
use crate::config::{CacheConfig, EvictionPolicy};
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_reaper, ReaperHealth};
use crate::waiter::{CondvarWaiter, Waiter};

// == Cache Core ==
/// State shared between the facade and the reaper thread.
pub(crate) struct CacheCore<K, V> {
    pub(crate) store: Store<K, V>,
    pub(crate) queue: ExpiryQueue<K>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) waiter: Box<dyn Waiter>,
    /// Serializes put/get/remove and reaper evictions
    pub(crate) ops: Mutex<()>,
    /// Held around every wait and notify on `waiter`
    pub(crate) wake_scope: Mutex<()>,
    pub(crate) stats: StatsRecorder,
    pub(crate) policy: EvictionPolicy,
    health: RwLock<ReaperHealth>,
    stopping: AtomicBool,
    next_id: AtomicU64,
}

impl<K, V> CacheCore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new(
        policy: EvictionPolicy,
        clock: Box<dyn Clock>,
        waiter: Box<dyn Waiter>,
    ) -> Self {
        Self {
            store: Store::new(),
            queue: ExpiryQueue::new(),
            clock,
            waiter,
            ops: Mutex::new(()),
            wake_scope: Mutex::new(()),
            stats: StatsRecorder::new(),
            policy,
            health: RwLock::new(ReaperHealth::Running),
            stopping: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn next_marker_id(&self) -> MarkerId {
        MarkerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // == Evict ==
    /// Removes the value a due marker points at, honouring the eviction policy.
    ///
    /// Returns true if a value was removed, false if the marker was stale.
    pub(crate) fn evict(&self, marker: &ExpiryMarker<K>) -> bool {
        let _ops = self.ops.lock();
        let removed = match self.policy {
            EvictionPolicy::Generational => self.store.remove_if_current(&marker.key, marker.id),
            EvictionPolicy::Unconditional => self.store.remove(&marker.key),
        };

        if removed {
            self.stats.record_eviction();
        } else {
            self.stats.record_stale_marker();
        }
        removed
    }
}

impl<K, V> CacheCore<K, V> {
    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub(crate) fn health(&self) -> ReaperHealth {
        self.health.read().clone()
    }

    pub(crate) fn mark_failed(&self, reason: String) {
        *self.health.write() = ReaperHealth::Failed { reason };
    }

    /// Records a clean exit. A recorded failure is kept.
    pub(crate) fn mark_stopped(&self) {
        let mut health = self.health.write();
        if *health == ReaperHealth::Running {
            *health = ReaperHealth::Stopped;
        }
    }
}

// == Expiring Cache ==
/// Thread-safe key/value map whose entries are removed once their TTL elapses.
///
/// Each cache owns one reaper thread that sleeps until the soonest expiry and is
/// woken early when a put introduces a sooner one. The thread is stopped by
/// [`shutdown`](ExpiringCache::shutdown) or when the cache is dropped.
///
/// # Example
/// ```
/// use expiring_map::ExpiringCache;
///
/// let cache: ExpiringCache<String, String> = ExpiringCache::new().unwrap();
/// cache.put("session".to_string(), "token".to_string(), 60_000).unwrap();
/// assert_eq!(cache.get(&"session".to_string()), Some("token".to_string()));
/// ```
pub struct ExpiringCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    core: Arc<CacheCore<K, V>>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache with the default configuration, the platform monotonic clock
    /// and a condition-variable waiter.
    pub fn new() -> Result<Self> {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache from configuration with the default collaborators.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        Self::with_parts(config, MonotonicClock::new(), CondvarWaiter::new())
    }

    /// Creates a cache with an injected clock and waiter.
    ///
    /// # Arguments
    /// * `config` - Cache configuration
    /// * `clock` - Time source for expiries
    /// * `waiter` - Primitive the reaper sleeps on
    pub fn with_parts<C, W>(config: CacheConfig, clock: C, waiter: W) -> Result<Self>
    where
        C: Clock,
        W: Waiter,
    {
        let core = Arc::new(CacheCore::new(
            config.eviction_policy,
            Box::new(clock),
            Box::new(waiter),
        ));
        let handle = spawn_reaper(Arc::clone(&core), &config)?;

        Ok(Self {
            core,
            reaper: Mutex::new(Some(handle)),
        })
    }

    // == Put ==
    /// Stores a key-value pair that expires `ttl_ms` milliseconds from now.
    ///
    /// An existing value under the key is replaced.
    ///
    /// # Errors
    /// * [`CacheError::InvalidTtl`] if `ttl_ms` is negative; nothing is stored
    /// * [`CacheError::ReaperFailed`] / [`CacheError::ShutDown`] if the reaper is not
    ///   running, since the entry would never expire
    pub fn put(&self, key: K, value: V, ttl_ms: i64) -> Result<()> {
        let ttl_ms = u64::try_from(ttl_ms).map_err(|_| CacheError::InvalidTtl(ttl_ms))?;
        self.put_nanos(key, value, millis_to_nanos(ttl_ms))
    }

    /// Stores a key-value pair that expires after `ttl`.
    pub fn put_for(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        self.put_nanos(key, value, duration_to_nanos(ttl))
    }

    fn put_nanos(&self, key: K, value: V, ttl: u64) -> Result<()> {
        self.ensure_reaper_running()?;

        let core = &*self.core;
        let _ops = core.ops.lock();
        // Shutdown may have started after the check above
        if core.is_stopping() {
            return Err(CacheError::ShutDown);
        }

        let expiry = core.clock.now().saturating_add(ttl);
        let id = core.next_marker_id();
        core.queue.insert(ExpiryMarker::new(expiry, key.clone(), id));

        // Wake the reaper if this marker is now the soonest
        if core.queue.peek().map_or(true, |head| expiry <= head.expiry) {
            let scope = core.wake_scope.lock();
            core.waiter.notify(&scope);
            core.stats.record_wake_notification();
            debug!(marker = id.get(), expiry, "notified reaper of sooner expiry");
        }

        core.store.put(key, id, value);
        core.stats.record_put();
        Ok(())
    }

    fn ensure_reaper_running(&self) -> Result<()> {
        if self.core.is_stopping() {
            return Err(CacheError::ShutDown);
        }
        match self.core.health() {
            ReaperHealth::Running => Ok(()),
            ReaperHealth::Stopped => Err(CacheError::ShutDown),
            ReaperHealth::Failed { reason } => Err(CacheError::ReaperFailed(reason)),
        }
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `None` whether the key was never stored, was removed or has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let _ops = self.core.ops.lock();
        let value = self.core.store.get(key);
        match value {
            Some(_) => self.core.stats.record_hit(),
            None => self.core.stats.record_miss(),
        }
        value
    }

    // == Contains ==
    pub fn contains_key(&self, key: &K) -> bool {
        let _ops = self.core.ops.lock();
        self.core.store.contains_key(key)
    }

    // == Remove ==
    /// Removes an entry by key. Removing an absent key is a no-op.
    ///
    /// The entry's pending expiry marker stays queued and is discarded when due.
    pub fn remove(&self, key: &K) {
        let _ops = self.core.ops.lock();
        if self.core.store.remove(key) {
            self.core.stats.record_removal();
        }
    }

    // == Size ==
    /// Returns the current number of entries.
    pub fn size(&self) -> usize {
        self.core.store.len()
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.core.store.is_empty()
    }

    /// Returns the number of expiry markers still queued, stale ones included.
    pub fn pending_markers(&self) -> usize {
        self.core.queue.len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.core
            .stats
            .snapshot(self.core.store.len(), self.core.queue.len())
    }

    /// Reports whether the reaper is still evicting entries.
    pub fn reaper_health(&self) -> ReaperHealth {
        self.core.health()
    }

    // == Shutdown ==
    /// Stops the reaper and waits for its thread to exit.
    ///
    /// Entries already stored stay readable but no longer expire, and later puts
    /// fail with [`CacheError::ShutDown`]. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        let Some(handle) = self.reaper.lock().take() else {
            return;
        };

        {
            let _ops = self.core.ops.lock();
            self.core.stopping.store(true, Ordering::SeqCst);
        }
        self.core.queue.close();
        {
            let scope = self.core.wake_scope.lock();
            self.core.waiter.notify(&scope);
        }

        if handle.join().is_err() {
            warn!("Reaper thread panicked before shutdown");
        }
        info!("Expiring cache shut down");
    }
}

impl<K, V> Drop for ExpiringCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, NANOS_PER_MILLI};
    use std::time::Instant;

    fn manual_cache(policy: EvictionPolicy) -> (ExpiringCache<String, String>, ManualClock) {
        let clock = ManualClock::new(0);
        let config = CacheConfig::default().with_eviction_policy(policy);
        let cache = ExpiringCache::with_parts(config, clock.clone(), CondvarWaiter::new()).unwrap();
        (cache, clock)
    }

    /// Waiter that ignores the timeout and sleeps until notified, counting waits.
    #[derive(Clone, Default)]
    struct ParkingWaiter {
        condvar: Arc<parking_lot::Condvar>,
        waits: Arc<AtomicU64>,
    }

    impl Waiter for ParkingWaiter {
        fn wait(
            &self,
            scope: &mut crate::waiter::WakeScope<'_>,
            _millis: u64,
            _nanos: u32,
        ) -> std::result::Result<(), crate::error::WaitError> {
            self.waits.fetch_add(1, Ordering::SeqCst);
            self.condvar.wait(scope);
            Ok(())
        }

        fn notify(&self, _scope: &crate::waiter::WakeScope<'_>) {
            self.condvar.notify_all();
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn test_cache_put_and_get() {
        let (cache, _clock) = manual_cache(EvictionPolicy::Generational);

        cache.put("key1".to_string(), "value1".to_string(), 3_600_000).unwrap();
        cache.put("key2".to_string(), "value2".to_string(), 3_600_000).unwrap();

        assert_eq!(cache.get(&"key1".to_string()), Some("value1".to_string()));
        assert_eq!(cache.get(&"key2".to_string()), Some("value2".to_string()));
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn test_cache_remove() {
        let (cache, _clock) = manual_cache(EvictionPolicy::Generational);

        cache.put("key1".to_string(), "value1".to_string(), i64::MAX).unwrap();
        cache.remove(&"key1".to_string());

        assert_eq!(cache.get(&"key1".to_string()), None);
        assert!(cache.is_empty());
        // Remove leaves the marker queued
        assert!(wait_until(|| cache.pending_markers() == 1));
    }

    #[test]
    fn test_cache_remove_absent_is_noop() {
        let (cache, _clock) = manual_cache(EvictionPolicy::Generational);

        cache.remove(&"missing".to_string());
        cache.remove(&"missing".to_string());

        assert_eq!(cache.stats().removals, 0);
    }

    #[test]
    fn test_cache_rejects_negative_ttl() {
        let (cache, _clock) = manual_cache(EvictionPolicy::Generational);

        let result = cache.put("k".to_string(), "v".to_string(), -5);

        assert!(matches!(result, Err(CacheError::InvalidTtl(-5))));
        assert_eq!(cache.get(&"k".to_string()), None);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.pending_markers(), 0);
    }

    #[test]
    fn test_cache_accepts_largest_ttl() {
        let (cache, _clock) = manual_cache(EvictionPolicy::Generational);

        cache.put("k".to_string(), "v".to_string(), i64::MAX).unwrap();

        assert_eq!(cache.get(&"k".to_string()), Some("v".to_string()));
    }

    #[test]
    fn test_cache_put_notifies_only_for_sooner_expiry() {
        let waiter = ParkingWaiter::default();
        let cache: ExpiringCache<String, String> =
            ExpiringCache::with_parts(CacheConfig::default(), ManualClock::new(0), waiter.clone())
                .unwrap();

        cache.put("late".to_string(), "v".to_string(), 25).unwrap();
        assert!(wait_until(|| waiter.waits.load(Ordering::SeqCst) == 1));
        let after_first = cache.stats().wake_notifications;

        cache.put("later".to_string(), "v".to_string(), 50).unwrap();
        assert_eq!(cache.stats().wake_notifications, after_first);

        cache.put("soon".to_string(), "v".to_string(), 1).unwrap();
        assert_eq!(cache.stats().wake_notifications, after_first + 1);
        assert!(wait_until(|| waiter.waits.load(Ordering::SeqCst) == 2));
    }

    #[test]
    fn test_cache_expires_at_boundary() {
        let (cache, clock) = manual_cache(EvictionPolicy::Generational);

        cache.put("key1".to_string(), "value1".to_string(), 10).unwrap();
        clock.advance_nanos(10 * NANOS_PER_MILLI);

        assert!(wait_until(|| cache.get(&"key1".to_string()).is_none()));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_cache_stats_track_hits_and_misses() {
        let (cache, _clock) = manual_cache(EvictionPolicy::Generational);

        cache.put("key1".to_string(), "value1".to_string(), 60_000).unwrap();
        cache.get(&"key1".to_string());
        cache.get(&"nonexistent".to_string());

        let stats = cache.stats();
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_cache_shutdown_stops_reaper() {
        let (cache, _clock) = manual_cache(EvictionPolicy::Generational);
        cache.put("key1".to_string(), "value1".to_string(), 60_000).unwrap();

        cache.shutdown();

        assert_eq!(cache.reaper_health(), ReaperHealth::Stopped);
        assert_eq!(cache.get(&"key1".to_string()), Some("value1".to_string()));
        assert!(matches!(
            cache.put("key2".to_string(), "value2".to_string(), 10),
            Err(CacheError::ShutDown)
        ));

        // Second call is a no-op
        cache.shutdown();
    }

    #[test]
    fn test_cache_shutdown_with_empty_queue() {
        let (cache, _clock) = manual_cache(EvictionPolicy::Generational);

        cache.shutdown();

        assert_eq!(cache.reaper_health(), ReaperHealth::Stopped);
    }

    #[test]
    fn test_cache_put_blocked_behind_shutdown_is_rejected() {
        let (cache, _clock) = manual_cache(EvictionPolicy::Generational);

        std::thread::scope(|s| {
            // Hold the ops lock so the put stalls after its first health check
            let ops = cache.core.ops.lock();
            let put = s.spawn(|| cache.put("late".to_string(), "v".to_string(), 10));
            std::thread::sleep(Duration::from_millis(50));
            cache.core.stopping.store(true, Ordering::SeqCst);
            drop(ops);

            assert!(matches!(put.join().unwrap(), Err(CacheError::ShutDown)));
        });

        assert!(!cache.contains_key(&"late".to_string()));
        assert_eq!(cache.pending_markers(), 0);
        assert_eq!(cache.stats().puts, 0);
    }

    #[test]
    fn test_cache_contains_key() {
        let (cache, clock) = manual_cache(EvictionPolicy::Generational);

        cache.put("key1".to_string(), "value1".to_string(), 10).unwrap();
        cache.put("key2".to_string(), "value2".to_string(), 60_000).unwrap();
        cache.remove(&"key2".to_string());

        assert!(cache.contains_key(&"key1".to_string()));
        assert!(!cache.contains_key(&"key2".to_string()));
        assert!(!cache.contains_key(&"missing".to_string()));

        clock.advance_nanos(10 * NANOS_PER_MILLI);
        assert!(wait_until(|| !cache.contains_key(&"key1".to_string())));
        // Lookups through contains_key are not counted as hits or misses
        assert_eq!(cache.stats().hits + cache.stats().misses, 0);
    }
}
