//! Backing-store cache management.
//!
//! [`BackingStoreManager`] keeps at most a handful of full-resolution backing
//! stores alive, one per surface, in a [`BoundedMruCache`]. The cache is only
//! allocated while it holds something and is never allocated at all when the
//! configured capacity is zero.
//!
//! Capacity-driven evictions are announced to eviction observers before the
//! victim is dropped; explicit removals and replacements are silent.

use crate::backing_store::{BackingStore, PaintUpdate};
use crate::config::BackingStoreConfig;
use crate::errors::HostError;
use crate::memory_tier::MemoryTierOracle;
use crate::surface::SurfaceId;
use bstore_cache::{BoundedMruCache, CacheStats, EvictionObserver};
use bstore_common::Size;
use bstore_pixelbuffer::PixelFormat;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info};

/// Observer type for backing-store evictions.
pub type BackingStoreObserver = EvictionObserver<SurfaceId, BackingStore>;

/// Result of [`BackingStoreManager::prepare_backing_store`].
#[derive(Debug)]
pub struct PreparedBackingStore<'a> {
    /// The store, with the paint already applied.
    pub store: &'a mut BackingStore,
    /// The store was freshly created and the paint did not cover all of it,
    /// so the caller must request a complete repaint.
    pub needs_full_paint: bool,
}

/// Owns every live backing store.
pub struct BackingStoreManager {
    cache: Option<BoundedMruCache<SurfaceId, BackingStore>>,
    capacity: usize,
    format: PixelFormat,
    observers: Vec<BackingStoreObserver>,
    /// Counters from caches that have already been torn down.
    retired: CacheStats,
}

impl BackingStoreManager {
    /// Create a manager keeping up to `capacity` stores. Zero disables caching.
    pub fn new(capacity: usize, format: PixelFormat) -> Self {
        if capacity == 0 {
            info!("Backing store cache disabled");
        }
        Self {
            cache: None,
            capacity,
            format,
            observers: Vec::new(),
            retired: CacheStats::default(),
        }
    }

    /// Create a manager sized from configuration and the machine's memory tier.
    pub fn from_config(
        config: &BackingStoreConfig,
        oracle: &dyn MemoryTierOracle,
        format: PixelFormat,
    ) -> Self {
        Self::new(config.effective_capacity(oracle), format)
    }

    /// Configured capacity (0 when disabled).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pixel format of every store this manager creates.
    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    /// Register a callback run for each capacity eviction, before the store is dropped.
    pub fn add_eviction_observer(&mut self, observer: BackingStoreObserver) {
        if let Some(cache) = self.cache.as_mut() {
            cache.add_eviction_observer(Arc::clone(&observer));
        }
        self.observers.push(observer);
    }

    /// The store for `owner` if it exists and is exactly `size`.
    ///
    /// Does not affect eviction order.
    pub fn get_backing_store(&self, owner: SurfaceId, size: Size) -> Option<&BackingStore> {
        self.lookup(owner).filter(|store| store.size() == size)
    }

    /// The store for `owner` at any size. Does not affect eviction order.
    pub fn lookup(&self, owner: SurfaceId) -> Option<&BackingStore> {
        self.cache.as_ref()?.peek(&owner)
    }

    /// Mutable access to the store for `owner`. Does not affect eviction order.
    pub fn lookup_mut(&mut self, owner: SurfaceId) -> Option<&mut BackingStore> {
        self.cache.as_mut()?.peek_mut(&owner)
    }

    /// Get or create the store for `owner` at `size` and apply `update` to it.
    ///
    /// A store of the wrong size is discarded (no eviction notification) and
    /// replaced. Inserting a new store may evict another surface's store.
    /// Returns `Ok(None)` when caching is disabled.
    ///
    /// # Errors
    ///
    /// Fails with [`HostError::InvalidSize`] if the store cannot be allocated
    /// (nothing is cached in that case) or [`HostError::Paint`] if the update
    /// cannot be applied.
    pub fn prepare_backing_store(
        &mut self,
        owner: SurfaceId,
        size: Size,
        update: &PaintUpdate,
    ) -> Result<Option<PreparedBackingStore<'_>>, HostError> {
        let Some(capacity) = NonZeroUsize::new(self.capacity) else {
            return Ok(None);
        };

        let mut needs_full_paint = false;
        if self.get_backing_store(owner, size).is_none() {
            self.remove_backing_store(owner);

            let store = BackingStore::new(owner, size, self.format)?;
            needs_full_paint = !update.covers(size);
            debug!(
                "Created {}x{} backing store for surface {}",
                size.width, size.height, owner
            );
            self.allocated_cache(capacity).put(owner, store);
        }

        let Some(store) = self.cache.as_mut().and_then(|cache| cache.peek_mut(&owner)) else {
            return Ok(None);
        };
        store.paint_rect(update)?;

        Ok(Some(PreparedBackingStore {
            store,
            needs_full_paint,
        }))
    }

    /// Drop the store for `owner`, if any, without notifying observers.
    ///
    /// Returns true if a store was removed.
    pub fn remove_backing_store(&mut self, owner: SurfaceId) -> bool {
        let Some(cache) = self.cache.as_mut() else {
            return false;
        };
        let removed = cache.erase(&owner).is_some();
        if removed {
            debug!("Removed backing store for surface {}", owner);
        }
        if cache.is_empty() {
            self.release_cache();
        }
        removed
    }

    /// Drop every store without notifying observers.
    pub fn remove_all(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        self.release_cache();
    }

    /// Number of live stores.
    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, BoundedMruCache::len)
    }

    /// True when no store is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while the underlying cache object exists.
    pub fn is_cache_allocated(&self) -> bool {
        self.cache.is_some()
    }

    /// Surfaces with a live store, most recently inserted or replaced first.
    pub fn owners_by_recency(&self) -> Vec<SurfaceId> {
        self.cache
            .as_ref()
            .map(|cache| cache.keys_by_recency().copied().collect())
            .unwrap_or_default()
    }

    /// Bytes of pixel memory held by all live stores.
    pub fn memory_size(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| {
            cache.iter().map(|(_, store)| store.memory_size()).sum()
        })
    }

    /// Counters over the manager's whole lifetime.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            capacity: self.capacity,
            ..self.retired
        };
        if let Some(cache) = self.cache.as_ref() {
            let current = cache.stats();
            stats.accumulate(&current);
            stats.entries = current.entries;
        }
        stats
    }

    fn allocated_cache(
        &mut self,
        capacity: NonZeroUsize,
    ) -> &mut BoundedMruCache<SurfaceId, BackingStore> {
        let observers = &self.observers;
        self.cache.get_or_insert_with(|| {
            info!("Allocating backing store cache (capacity {})", capacity);
            let mut cache = BoundedMruCache::new(capacity);
            for observer in observers {
                cache.add_eviction_observer(Arc::clone(observer));
            }
            cache
        })
    }

    fn release_cache(&mut self) {
        if let Some(cache) = self.cache.take() {
            self.retired.accumulate(&cache.stats());
            debug!("Backing store cache empty, released");
        }
    }
}

impl std::fmt::Debug for BackingStoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStoreManager")
            .field("capacity", &self.capacity)
            .field("owners", &self.owners_by_recency())
            .field("observers", &self.observers.len())
            .finish()
    }
}
