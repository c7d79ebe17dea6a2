//! Bounded most-recently-used cache that owns its values.
//!
//! [`BoundedMruCache`] maps keys to owned values, ordered by recency of use,
//! and never holds more than its configured capacity. When inserting a new key
//! would overflow the cache, the least recently used entry is evicted; every
//! registered [`EvictionObserver`] sees the victim while the cache still owns
//! it, and only then is the value dropped.
//!
//! Only capacity pressure is an eviction. Replacing a key with [`put`],
//! removing it with [`erase`] or emptying the cache with [`clear`] destroy
//! values without notifying observers; callers that want to salvage something
//! on those paths must do it themselves first.
//!
//! Lookups come in two flavours: [`peek`] leaves the recency order alone (use it
//! for status checks), [`get`] marks the entry as most recently used.
//!
//! [`put`]: BoundedMruCache::put
//! [`erase`]: BoundedMruCache::erase
//! [`clear`]: BoundedMruCache::clear
//! [`peek`]: BoundedMruCache::peek
//! [`get`]: BoundedMruCache::get
//!
//! ## Usage
//!
//! ```rust
//! use bstore_cache::BoundedMruCache;
//! use std::num::NonZeroUsize;
//! use std::sync::{Arc, Mutex};
//!
//! let capacity = NonZeroUsize::new(2).unwrap();
//! let mut cache: BoundedMruCache<u32, String> = BoundedMruCache::new(capacity);
//!
//! let evicted = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&evicted);
//! cache.add_eviction_observer(Arc::new(move |key: &u32, value: &String| {
//!     sink.lock().unwrap().push((*key, value.clone()));
//! }));
//!
//! cache.put(1, "one".to_string());
//! cache.put(2, "two".to_string());
//! assert!(cache.peek(&1).is_some()); // does not refresh key 1
//! cache.put(3, "three".to_string()); // evicts key 1
//!
//! assert_eq!(*evicted.lock().unwrap(), vec![(1, "one".to_string())]);
//! ```

use crate::stats::CacheStats;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Callback invoked with an entry that is about to be evicted.
///
/// The observer only receives shared references, so it cannot touch the cache
/// that is mid-eviction.
pub type EvictionObserver<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Fixed-capacity key/value cache with least-recently-used eviction.
///
/// Not thread-safe by itself; all mutation goes through `&mut self`.
pub struct BoundedMruCache<K, V> {
    capacity: NonZeroUsize,
    entries: HashMap<K, V>,
    /// Recency order, most recently used at the front.
    order: VecDeque<K>,
    observers: Vec<EvictionObserver<K, V>>,
    stats: CacheStats,
}

impl<K, V> BoundedMruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache holding at most `capacity` entries.
    ///
    /// A cache with no capacity is not representable; callers that compute a
    /// capacity of zero should skip creating the cache altogether.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.get()),
            order: VecDeque::with_capacity(capacity.get()),
            observers: Vec::new(),
            stats: CacheStats::default(),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a callback for capacity-driven evictions.
    ///
    /// Observers run in registration order, synchronously, before the evicted
    /// value is dropped.
    pub fn add_eviction_observer(&mut self, observer: EvictionObserver<K, V>) {
        self.observers.push(observer);
    }

    /// Number of registered eviction observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Insert or replace the value for `key` and mark it most recently used.
    ///
    /// Replacing an existing key drops the old value without notifying
    /// observers. Inserting a new key into a full cache evicts the least
    /// recently used entry (never the one being inserted).
    pub fn put(&mut self, key: K, value: V) -> &mut V {
        if self.entries.contains_key(&key) {
            self.remove_from_order(&key);
        } else {
            while self.entries.len() >= self.capacity.get() {
                if self.evict_lru().is_none() {
                    break;
                }
            }
        }
        self.order.push_front(key.clone());

        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                self.stats.replacements += 1;
                // The previous value is dropped here.
                slot.insert(value);
                slot.into_mut()
            }
            Entry::Vacant(slot) => {
                self.stats.insertions += 1;
                slot.insert(value)
            }
        }
    }

    /// Look up `key` without changing its recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Mutable lookup that does not change recency.
    pub fn peek_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&mut V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.remove_from_order(key);
        self.order.push_front(key.clone());
        self.entries.get_mut(key)
    }

    /// True if `key` has a live entry. Does not change recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove `key` and hand its value back. Observers are not notified.
    pub fn erase(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.remove_from_order(key);
        self.stats.removals += 1;
        Some(value)
    }

    /// Drop every entry. Observers are not notified.
    pub fn clear(&mut self) {
        self.stats.removals += self.entries.len() as u64;
        self.entries.clear();
        self.order.clear();
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> + '_ {
        self.order.iter()
    }

    /// The key the next capacity eviction would pick.
    pub fn lru_key(&self) -> Option<&K> {
        self.order.back()
    }

    /// Iterate entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.order
            .iter()
            .filter_map(move |key| self.entries.get(key).map(|value| (key, value)))
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity.get(),
            ..self.stats
        }
    }

    fn evict_lru(&mut self) -> Option<K> {
        let victim = self.order.pop_back()?;

        if let Some(value) = self.entries.get(&victim) {
            for observer in &self.observers {
                observer(&victim, value);
            }
        }

        // Observers have returned; only now is the value destroyed.
        let removed = self.entries.remove(&victim);
        drop(removed);
        self.stats.evictions += 1;

        tracing::debug!(
            "MRU cache evicted least recently used entry ({} of {} slots in use)",
            self.entries.len(),
            self.capacity
        );

        Some(victim)
    }

    fn remove_from_order(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }
}

impl<K, V> fmt::Debug for BoundedMruCache<K, V>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedMruCache")
            .field("capacity", &self.capacity)
            .field("order", &self.order)
            .field("observers", &self.observers.len())
            .field("stats", &self.stats)
            .finish()
    }
}
