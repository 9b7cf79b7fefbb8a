//! Process-wide bounded metadata cache.
//!
//! Two-queue LRU: new entries land in a short recency queue; a second
//! reference promotes them to the frequency queue, so one-shot scans (a big
//! readdir, say) cannot wash out the hot set. Entries leave only by
//! eviction or explicit removal, never by age.

use std::hash::Hash;
use std::sync::Mutex;

use hashlink::LinkedHashMap;

/// Fraction of the capacity reserved for the recency queue.
const RECENT_DENOMINATOR: usize = 4;

struct Queues<K, V> {
    /// Entries seen once, oldest first.
    recent: LinkedHashMap<K, V>,
    /// Entries referenced at least twice, least recently used first.
    frequent: LinkedHashMap<K, V>,
}

/// A bounded two-queue cache, safe for concurrent readers and writers.
///
/// Values are cloned out on `get`; the queues are guarded by one mutex and
/// every operation is a handful of hash-map moves, so the critical section
/// stays short.
pub struct TwoQueueCache<K, V> {
    capacity: usize,
    recent_capacity: usize,
    queues: Mutex<Queues<K, V>>,
}

impl<K: Eq + Hash, V: Clone> TwoQueueCache<K, V> {
    /// Create a cache holding at most `capacity` entries across both queues.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= RECENT_DENOMINATOR, "capacity too small");
        Self {
            capacity,
            recent_capacity: capacity / RECENT_DENOMINATOR,
            queues: Mutex::new(Queues {
                recent: LinkedHashMap::new(),
                frequent: LinkedHashMap::new(),
            }),
        }
    }

    /// Look up `key`, promoting it on a recency-queue hit.
    pub fn get(&self, key: &K) -> Option<V>
    where
        K: Clone,
    {
        let mut queues = self.queues.lock().expect("cache mutex poisoned");
        if let Some(value) = queues.frequent.remove(key) {
            queues.frequent.insert(key.clone(), value.clone());
            return Some(value);
        }
        if let Some(value) = queues.recent.remove(key) {
            // Second reference: this entry has proven itself.
            queues.frequent.insert(key.clone(), value.clone());
            Self::evict(&mut queues, self.capacity, self.recent_capacity);
            return Some(value);
        }
        None
    }

    /// Insert or refresh `key`. A key already cached keeps its queue; a new
    /// key starts in the recency queue.
    pub fn insert(&self, key: K, value: V) {
        let mut queues = self.queues.lock().expect("cache mutex poisoned");
        if queues.frequent.contains_key(&key) {
            queues.frequent.insert(key, value);
        } else if queues.recent.contains_key(&key) {
            queues.recent.insert(key, value);
        } else {
            queues.recent.insert(key, value);
            Self::evict(&mut queues, self.capacity, self.recent_capacity);
        }
    }

    /// Drop `key` from whichever queue holds it.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut queues = self.queues.lock().expect("cache mutex poisoned");
        queues
            .recent
            .remove(key)
            .or_else(|| queues.frequent.remove(key))
    }

    /// Current number of cached entries.
    pub fn len(&self) -> usize {
        let queues = self.queues.lock().expect("cache mutex poisoned");
        queues.recent.len() + queues.frequent.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(queues: &mut Queues<K, V>, capacity: usize, recent_capacity: usize) {
        while queues.recent.len() + queues.frequent.len() > capacity {
            if queues.recent.len() > recent_capacity || queues.frequent.is_empty() {
                queues.recent.pop_front();
            } else {
                queues.frequent.pop_front();
            }
        }
    }
}
