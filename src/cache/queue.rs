//! Expiry Queue Module
//!
//! Thread-safe min-priority queue of expiry markers, soonest expiry first.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use parking_lot::{Condvar, Mutex};

use crate::cache::ExpiryMarker;

#[derive(Debug)]
struct QueueState<K> {
    heap: BinaryHeap<Reverse<ExpiryMarker<K>>>,
    closed: bool,
}

// == Expiry Queue ==
/// Pending markers ordered by expiry.
///
/// Any number of threads may insert and peek; a single consumer blocks in
/// [`take_min`](ExpiryQueue::take_min) until a marker is available or the queue is
/// closed.
#[derive(Debug)]
pub struct ExpiryQueue<K> {
    state: Mutex<QueueState<K>>,
    available: Condvar,
}

impl<K: Clone> ExpiryQueue<K> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    // == Insert ==
    /// Adds a marker. Never blocks beyond the internal lock and never fails.
    pub fn insert(&self, marker: ExpiryMarker<K>) {
        let mut state = self.state.lock();
        state.heap.push(Reverse(marker));
        drop(state);
        self.available.notify_one();
    }

    // == Peek ==
    /// Returns a copy of the soonest marker without removing it.
    pub fn peek(&self) -> Option<ExpiryMarker<K>> {
        self.state.lock().heap.peek().map(|Reverse(m)| m.clone())
    }

    // == Take Min ==
    /// Removes and returns the soonest marker, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue has been closed.
    pub fn take_min(&self) -> Option<ExpiryMarker<K>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(Reverse(marker)) = state.heap.pop() {
                return Some(marker);
            }
            self.available.wait(&mut state);
        }
    }

    // == Close ==
    /// Wakes a blocked consumer and makes every later `take_min` return `None`.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    // == Length ==
    /// Returns the number of pending markers.
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }
}

impl<K: Clone> Default for ExpiryQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MarkerId;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn marker(expiry: u64, key: &str, id: u64) -> ExpiryMarker<String> {
        ExpiryMarker::new(expiry, key.to_string(), MarkerId(id))
    }

    #[test]
    fn test_queue_new_is_empty() {
        let queue: ExpiryQueue<String> = ExpiryQueue::new();
        assert!(queue.is_empty());
        assert!(queue.peek().is_none());
    }

    #[test]
    fn test_queue_peek_returns_soonest() {
        let queue = ExpiryQueue::new();

        queue.insert(marker(25, "key1", 1));
        queue.insert(marker(5, "key2", 2));
        queue.insert(marker(15, "key3", 3));

        let head = queue.peek().unwrap();
        assert_eq!(head.key, "key2");
        assert_eq!(queue.len(), 3, "Peek should not remove");
    }

    #[test]
    fn test_queue_take_min_in_expiry_order() {
        let queue = ExpiryQueue::new();

        queue.insert(marker(25, "key1", 1));
        queue.insert(marker(5, "key2", 2));
        queue.insert(marker(15, "key3", 3));

        let order: Vec<String> = (0..3).map(|_| queue.take_min().unwrap().key).collect();
        assert_eq!(order, vec!["key2", "key3", "key1"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_keeps_duplicate_keys() {
        let queue = ExpiryQueue::new();

        queue.insert(marker(5, "key1", 1));
        queue.insert(marker(10, "key1", 2));

        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queue_take_min_blocks_until_insert() {
        let queue = Arc::new(ExpiryQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take_min())
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished(), "Consumer should block on an empty queue");

        queue.insert(marker(1, "late", 1));

        let taken = consumer.join().unwrap().unwrap();
        assert_eq!(taken.key, "late");
    }

    #[test]
    fn test_queue_close_releases_consumer() {
        let queue: Arc<ExpiryQueue<String>> = Arc::new(ExpiryQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take_min())
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();

        assert!(consumer.join().unwrap().is_none());
        assert!(queue.is_closed());
    }

    #[test]
    fn test_queue_closed_ignores_pending_markers() {
        let queue = ExpiryQueue::new();
        queue.insert(marker(1, "key1", 1));

        queue.close();

        assert!(queue.take_min().is_none());
    }
}
