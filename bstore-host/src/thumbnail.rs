//! Thumbnail generation and caching.
//!
//! [`ThumbnailGenerator`] keeps a small downsampled snapshot per surface in a
//! side table that is independent of the backing-store cache, so a surface
//! whose backing store has been evicted can still be previewed. Snapshots come
//! from three places:
//!
//! - the eviction observer, which salvages the pixels of a backing store right
//!   before the manager drops it under capacity pressure,
//! - [`ThumbnailGenerator::thumbnail_for`], which downsamples a live store on
//!   demand,
//! - [`ThumbnailGenerator::widget_hidden`], which captures a never-thumbnailed
//!   surface as it goes out of view.
//!
//! A surface that was just shown keeps its old thumbnail for one debounce
//! window even if its backing store is repainted, so rapid show/hide churn does
//! not keep throwing snapshots away. A one-shot timer expires those protected
//! thumbnails once the window has passed.

use crate::backing_store::BackingStore;
use crate::clock::{Clock, SystemClock};
use crate::config::ThumbnailConfig;
use crate::manager::{BackingStoreManager, BackingStoreObserver};
use crate::surface::SurfaceId;
use crate::timer::OneShotTimer;
use bstore_pixelbuffer::{downsample, ManagedPixelBuffer};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// A downsampled snapshot, possibly empty.
///
/// Cloning shares the pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thumbnail(Option<Arc<ManagedPixelBuffer>>);

impl Thumbnail {
    /// A thumbnail with no pixels.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Wrap downsampled pixels.
    pub fn from_buffer(buffer: ManagedPixelBuffer) -> Self {
        Self(Some(Arc::new(buffer)))
    }

    /// True when there are no pixels.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// The pixels, if any.
    pub fn buffer(&self) -> Option<&ManagedPixelBuffer> {
        self.0.as_deref()
    }

    /// Width and height, if not empty.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.buffer().map(|b| (b.width(), b.height()))
    }

    /// Mean colour, if not empty.
    pub fn average_rgb(&self) -> Option<[u8; 3]> {
        self.buffer().and_then(ManagedPixelBuffer::average_rgb)
    }
}

/// Per-surface thumbnail record.
#[derive(Debug, Clone, Default)]
pub struct WidgetThumbnail {
    /// Cached snapshot; empty when invalidated or never taken.
    pub thumbnail: Thumbnail,
    /// When the surface was last shown.
    pub last_shown: Option<Instant>,
    /// When the surface was last hidden.
    pub last_hidden: Option<Instant>,
}

/// Counters for thumbnail activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThumbnailStats {
    /// Thumbnails downsampled from a live backing store on request.
    pub generated: u64,
    /// Thumbnails captured from a backing store about to be destroyed.
    pub salvaged: u64,
    /// Cached thumbnails cleared by repaint or timer expiry.
    pub invalidated: u64,
    /// Requests answered from a protected cached thumbnail.
    pub served_from_cache: u64,
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    max_width: u32,
    max_height: u32,
}

impl Bounds {
    fn snapshot(&self, store: &BackingStore) -> Thumbnail {
        Thumbnail::from_buffer(downsample(store.buffer(), self.max_width, self.max_height))
    }
}

#[derive(Debug, Default)]
struct Shared {
    table: HashMap<SurfaceId, WidgetThumbnail>,
    stats: ThumbnailStats,
}

impl Shared {
    fn salvage(&mut self, owner: SurfaceId, store: &BackingStore, bounds: Bounds) {
        let entry = self.table.entry(owner).or_default();
        if !entry.thumbnail.is_empty() {
            trace!("Surface {} already has a thumbnail, not salvaging", owner);
            return;
        }
        entry.thumbnail = bounds.snapshot(store);
        self.stats.salvaged += 1;
        debug!(
            "Salvaged {:?} thumbnail from backing store of surface {}",
            entry.thumbnail.dimensions(),
            owner
        );
    }
}

/// Produces and caches thumbnails for surfaces.
pub struct ThumbnailGenerator {
    shared: Arc<Mutex<Shared>>,
    /// Recently shown surfaces whose thumbnails expire when the window passes.
    pending: Vec<SurfaceId>,
    timer: OneShotTimer,
    clock: Arc<dyn Clock>,
    window: Duration,
    bounds: Bounds,
}

impl ThumbnailGenerator {
    /// Create a generator on the system clock.
    pub fn new(config: &ThumbnailConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a generator reading time from `clock`.
    pub fn with_clock(config: &ThumbnailConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            pending: Vec::new(),
            timer: OneShotTimer::new(),
            clock,
            window: config.debounce_window(),
            bounds: Bounds {
                max_width: config.max_width,
                max_height: config.max_height,
            },
        }
    }

    /// The debounce window.
    pub fn debounce_window(&self) -> Duration {
        self.window
    }

    /// Observer to register with the backing-store manager.
    ///
    /// It only holds a weak reference, so it does nothing once the generator
    /// is dropped.
    pub fn eviction_observer(&self) -> BackingStoreObserver {
        let shared = Arc::downgrade(&self.shared);
        let bounds = self.bounds;
        Arc::new(move |owner: &SurfaceId, store: &BackingStore| {
            if let Some(shared) = shared.upgrade() {
                shared.lock().salvage(*owner, store, bounds);
            }
        })
    }

    /// Capture `store` for `owner` unless a thumbnail is already cached.
    ///
    /// Must run before `store` is destroyed.
    pub fn widget_will_destroy_backing_store(&self, owner: SurfaceId, store: &BackingStore) {
        self.shared.lock().salvage(owner, store, self.bounds);
    }

    /// The best available thumbnail for `owner`.
    ///
    /// Without a live backing store this is whatever is cached, possibly an
    /// empty thumbnail. With one, a cached thumbnail is reused while the
    /// surface is inside its debounce window; otherwise the store is
    /// downsampled and the result cached.
    pub fn thumbnail_for(&self, owner: SurfaceId, manager: &BackingStoreManager) -> Thumbnail {
        let now = self.clock.now();
        let mut shared = self.shared.lock();
        let Shared { table, stats } = &mut *shared;
        let entry = table.entry(owner).or_default();

        let Some(store) = manager.lookup(owner) else {
            return entry.thumbnail.clone();
        };

        if !entry.thumbnail.is_empty() && self.within_window(entry.last_shown, now) {
            stats.served_from_cache += 1;
            return entry.thumbnail.clone();
        }

        entry.thumbnail = self.bounds.snapshot(store);
        stats.generated += 1;
        trace!("Generated thumbnail for surface {}", owner);
        entry.thumbnail.clone()
    }

    /// The cached thumbnail for `owner`, without generating one.
    pub fn cached_thumbnail(&self, owner: SurfaceId) -> Thumbnail {
        self.shared
            .lock()
            .table
            .get(&owner)
            .map(|entry| entry.thumbnail.clone())
            .unwrap_or_default()
    }

    /// True if a record exists for `owner`.
    pub fn has_record(&self, owner: SurfaceId) -> bool {
        self.shared.lock().table.contains_key(&owner)
    }

    /// A new paint landed in `owner`'s backing store.
    ///
    /// Clears the cached thumbnail, unless the surface was shown within the
    /// debounce window.
    pub fn widget_did_update_backing_store(&self, owner: SurfaceId) {
        let now = self.clock.now();
        let mut shared = self.shared.lock();
        let Shared { table, stats } = &mut *shared;
        let Some(entry) = table.get_mut(&owner) else {
            return;
        };

        if self.within_window(entry.last_shown, now) {
            trace!("Keeping thumbnail of recently shown surface {}", owner);
            return;
        }

        if !entry.thumbnail.is_empty() {
            entry.thumbnail = Thumbnail::empty();
            stats.invalidated += 1;
            debug!("Invalidated thumbnail of surface {} after repaint", owner);
        }
    }

    /// `owner` became visible.
    pub fn widget_shown(&mut self, owner: SurfaceId) {
        let now = self.clock.now();
        {
            let mut shared = self.shared.lock();
            let entry = shared.table.entry(owner).or_default();
            entry.last_shown = Some(now);
            if entry.thumbnail.is_empty() {
                return;
            }
        }

        if let Some(pos) = self.pending.iter().position(|id| *id == owner) {
            warn!("Surface {} shown twice without being hidden", owner);
            self.pending.remove(pos);
        }
        self.pending.push(owner);

        if !self.timer.is_running() {
            self.timer.start(now, self.window);
            debug!("Thumbnail expiry timer armed for {:?}", self.window);
        }
    }

    /// `owner` went out of view. Captures a thumbnail if none is cached.
    pub fn widget_hidden(&mut self, owner: SurfaceId, manager: &BackingStoreManager) {
        let now = self.clock.now();
        let needs_capture = {
            let mut shared = self.shared.lock();
            let entry = shared.table.entry(owner).or_default();
            entry.last_hidden = Some(now);
            entry.thumbnail.is_empty()
        };

        self.unprotect(owner);

        if needs_capture {
            self.thumbnail_for(owner, manager);
        }
    }

    /// `owner` is being destroyed. Its thumbnail record is left alone.
    pub fn widget_destroyed(&mut self, owner: SurfaceId) {
        self.unprotect(owner);
    }

    /// Drop everything known about `owner`.
    pub fn forget(&mut self, owner: SurfaceId) {
        self.unprotect(owner);
        self.shared.lock().table.remove(&owner);
    }

    /// When the expiry timer wants to run next.
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Run the expiry timer if it is due. Returns how many thumbnails expired.
    pub fn run_expired_timers(&mut self) -> usize {
        let now = self.clock.now();
        if !self.timer.take_if_expired(now) {
            return 0;
        }

        let window = self.window;
        let mut expired = 0;
        {
            let mut shared = self.shared.lock();
            let Shared { table, stats } = &mut *shared;
            self.pending.retain(|owner| {
                let Some(entry) = table.get_mut(owner) else {
                    return false;
                };
                let due = entry
                    .last_shown
                    .map_or(true, |shown| now.saturating_duration_since(shown) >= window);
                if due {
                    if !entry.thumbnail.is_empty() {
                        stats.invalidated += 1;
                    }
                    entry.thumbnail = Thumbnail::empty();
                    expired += 1;
                }
                !due
            });
        }

        if !self.pending.is_empty() {
            self.timer.start(now, self.window / 2);
            debug!(
                "{} thumbnail(s) still protected, re-arming expiry timer for {:?}",
                self.pending.len(),
                self.window / 2
            );
        } else {
            trace!("Thumbnail expiry timer drained ({} expired)", expired);
        }

        expired
    }

    /// True while `owner` waits for its protected thumbnail to expire.
    pub fn is_pending(&self, owner: SurfaceId) -> bool {
        self.pending.contains(&owner)
    }

    /// Number of surfaces waiting for expiry.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> ThumbnailStats {
        self.shared.lock().stats
    }

    /// Take `owner` off the expiry list, cancelling the timer once nothing is left.
    fn unprotect(&mut self, owner: SurfaceId) {
        self.pending.retain(|id| *id != owner);
        if self.pending.is_empty() && self.timer.is_running() {
            self.timer.stop();
            trace!("Thumbnail expiry timer cancelled");
        }
    }

    fn within_window(&self, last_shown: Option<Instant>, now: Instant) -> bool {
        last_shown.is_some_and(|shown| now.saturating_duration_since(shown) < self.window)
    }
}

impl std::fmt::Debug for ThumbnailGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailGenerator")
            .field("pending", &self.pending)
            .field("timer", &self.timer)
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing_store::PaintUpdate;
    use crate::clock::ManualClock;
    use crate::surface::SurfaceRegistry;
    use bstore_common::{Rect, Size};
    use bstore_pixelbuffer::PixelFormat;

    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const WINDOW: Duration = Duration::from_secs(3);

    struct Fixture {
        registry: SurfaceRegistry,
        manager: BackingStoreManager,
        generator: ThumbnailGenerator,
        clock: ManualClock,
    }

    impl Fixture {
        fn new(capacity: usize) -> Self {
            let clock = ManualClock::new();
            let config = ThumbnailConfig {
                debounce_window_ms: WINDOW.as_millis() as u64,
                max_width: 32,
                max_height: 32,
            };
            let generator = ThumbnailGenerator::with_clock(&config, Arc::new(clock.clone()));
            let mut manager = BackingStoreManager::new(capacity, PixelFormat::rgb888());
            manager.add_eviction_observer(generator.eviction_observer());
            Self {
                registry: SurfaceRegistry::new(),
                manager,
                generator,
                clock,
            }
        }

        fn paint(&mut self, owner: SurfaceId, rgba: [u8; 4]) {
            let size = Size::new(128, 128);
            let update = PaintUpdate::solid(Rect::from_size(size), &PixelFormat::rgb888(), rgba);
            self.manager
                .prepare_backing_store(owner, size, &update)
                .unwrap()
                .unwrap();
            self.generator.widget_did_update_backing_store(owner);
        }

        /// Give `owner` a cached thumbnail of `rgba` and a live store.
        fn thumbnailed(&mut self, rgba: [u8; 4]) -> SurfaceId {
            let owner = self.registry.create();
            self.paint(owner, rgba);
            assert!(!self.generator.thumbnail_for(owner, &self.manager).is_empty());
            owner
        }
    }

    #[test]
    fn empty_thumbnail_for_unknown_surface() {
        let mut fx = Fixture::new(2);
        let owner = fx.registry.create();
        let thumb = fx.generator.thumbnail_for(owner, &fx.manager);
        assert!(thumb.is_empty());
        assert_eq!(thumb.dimensions(), None);
        // Lookup creates the record lazily.
        assert!(fx.generator.has_record(owner));
    }

    #[test]
    fn generates_downsampled_thumbnail() {
        let mut fx = Fixture::new(2);
        let owner = fx.registry.create();
        fx.paint(owner, WHITE);

        let thumb = fx.generator.thumbnail_for(owner, &fx.manager);
        assert_eq!(thumb.dimensions(), Some((32, 32)));
        assert_eq!(thumb.average_rgb(), Some([255, 255, 255]));
        assert_eq!(fx.generator.stats().generated, 1);
    }

    #[test]
    fn eviction_salvages_thumbnail() {
        let mut fx = Fixture::new(1);
        let a = fx.registry.create();
        let b = fx.registry.create();
        fx.paint(a, BLACK);
        fx.paint(b, WHITE);

        assert!(fx.manager.lookup(a).is_none());
        let thumb = fx.generator.thumbnail_for(a, &fx.manager);
        assert_eq!(thumb.average_rgb(), Some([0, 0, 0]));
        assert_eq!(fx.generator.stats().salvaged, 1);
    }

    #[test]
    fn salvage_keeps_existing_thumbnail() {
        let mut fx = Fixture::new(2);
        let owner = fx.thumbnailed(WHITE);

        let mut registry = SurfaceRegistry::new();
        let black = BackingStore::new(registry.create(), Size::new(8, 8), PixelFormat::rgb888()).unwrap();
        fx.generator.widget_will_destroy_backing_store(owner, &black);

        assert_eq!(
            fx.generator.cached_thumbnail(owner).average_rgb(),
            Some([255, 255, 255])
        );
        assert_eq!(fx.generator.stats().salvaged, 0);
    }

    #[test]
    fn observer_is_inert_after_generator_dropped() {
        let mut fx = Fixture::new(1);
        let a = fx.registry.create();
        let b = fx.registry.create();
        let observer = fx.generator.eviction_observer();
        drop(std::mem::replace(
            &mut fx.generator,
            ThumbnailGenerator::new(&ThumbnailConfig::default()),
        ));

        let store = BackingStore::new(a, Size::new(8, 8), PixelFormat::rgb888()).unwrap();
        observer(&a, &store);
        fx.paint(a, BLACK);
        fx.paint(b, BLACK);
        assert!(!fx.generator.has_record(a));
    }

    #[test]
    fn repaint_invalidates_outside_window() {
        let mut fx = Fixture::new(2);
        let owner = fx.thumbnailed(BLACK);

        fx.generator.widget_did_update_backing_store(owner);
        assert!(fx.generator.cached_thumbnail(owner).is_empty());
        assert_eq!(fx.generator.stats().invalidated, 1);
    }

    #[test]
    fn repaint_within_window_keeps_thumbnail() {
        let mut fx = Fixture::new(2);
        let owner = fx.thumbnailed(BLACK);
        fx.generator.widget_shown(owner);

        fx.clock.advance(Duration::from_secs(1));
        fx.paint(owner, WHITE);
        let thumb = fx.generator.thumbnail_for(owner, &fx.manager);
        assert_eq!(thumb.average_rgb(), Some([0, 0, 0]));
        assert_eq!(fx.generator.stats().served_from_cache, 1);

        fx.clock.advance(Duration::from_secs(2));
        let thumb = fx.generator.thumbnail_for(owner, &fx.manager);
        assert_eq!(thumb.average_rgb(), Some([255, 255, 255]));
    }

    #[test]
    fn repaint_exactly_at_window_invalidates() {
        let mut fx = Fixture::new(2);
        let owner = fx.thumbnailed(BLACK);
        fx.generator.widget_shown(owner);

        fx.clock.advance(WINDOW - Duration::from_millis(1));
        fx.generator.widget_did_update_backing_store(owner);
        assert!(!fx.generator.cached_thumbnail(owner).is_empty());

        fx.clock.advance(Duration::from_millis(1));
        fx.generator.widget_did_update_backing_store(owner);
        assert!(fx.generator.cached_thumbnail(owner).is_empty());
        assert_eq!(fx.generator.stats().invalidated, 1);
    }

    #[test]
    fn timer_cancelled_when_last_protected_surface_leaves() {
        let mut fx = Fixture::new(4);
        let a = fx.thumbnailed(BLACK);
        let b = fx.thumbnailed(BLACK);
        fx.generator.widget_shown(a);
        fx.generator.widget_shown(b);
        assert!(fx.generator.next_timer_deadline().is_some());

        fx.generator.widget_destroyed(a);
        assert!(fx.generator.next_timer_deadline().is_some());

        fx.generator.widget_hidden(b, &fx.manager);
        assert_eq!(fx.generator.next_timer_deadline(), None);

        fx.generator.widget_shown(a);
        assert!(fx.generator.next_timer_deadline().is_some());
        fx.generator.forget(a);
        assert_eq!(fx.generator.next_timer_deadline(), None);
        assert_eq!(fx.generator.run_expired_timers(), 0);
    }

    #[test]
    fn shown_without_thumbnail_is_not_pending() {
        let mut fx = Fixture::new(2);
        let owner = fx.registry.create();
        fx.generator.widget_shown(owner);
        assert!(!fx.generator.is_pending(owner));
        assert_eq!(fx.generator.next_timer_deadline(), None);
    }

    #[test]
    fn duplicate_shown_moves_to_back() {
        let mut fx = Fixture::new(4);
        let a = fx.thumbnailed(BLACK);
        let b = fx.thumbnailed(BLACK);
        fx.generator.widget_shown(a);
        fx.generator.widget_shown(b);
        fx.generator.widget_shown(a);
        assert_eq!(fx.generator.pending, vec![b, a]);
    }

    #[test]
    fn timer_expires_and_rearms_at_half_window() {
        let mut fx = Fixture::new(4);
        let a = fx.thumbnailed(BLACK);
        let b = fx.thumbnailed(BLACK);
        let start = fx.clock.now();

        fx.generator.widget_shown(a);
        assert_eq!(fx.generator.next_timer_deadline(), Some(start + WINDOW));

        fx.clock.advance(Duration::from_secs(1));
        fx.generator.widget_shown(b);
        // Already running; deadline unchanged.
        assert_eq!(fx.generator.next_timer_deadline(), Some(start + WINDOW));

        fx.clock.advance(Duration::from_secs(1));
        assert_eq!(fx.generator.run_expired_timers(), 0);

        fx.clock.advance(Duration::from_secs(1));
        assert_eq!(fx.generator.run_expired_timers(), 1);
        assert!(fx.generator.cached_thumbnail(a).is_empty());
        assert!(!fx.generator.cached_thumbnail(b).is_empty());
        assert_eq!(
            fx.generator.next_timer_deadline(),
            Some(start + WINDOW + WINDOW / 2)
        );

        fx.clock.advance(WINDOW / 2);
        assert_eq!(fx.generator.run_expired_timers(), 1);
        assert!(fx.generator.cached_thumbnail(b).is_empty());
        assert_eq!(fx.generator.pending_len(), 0);
        assert_eq!(fx.generator.next_timer_deadline(), None);
    }

    #[test]
    fn hidden_captures_missing_thumbnail() {
        let mut fx = Fixture::new(2);
        let owner = fx.registry.create();
        fx.paint(owner, WHITE);
        assert!(fx.generator.cached_thumbnail(owner).is_empty());

        fx.generator.widget_hidden(owner, &fx.manager);
        assert_eq!(
            fx.generator.cached_thumbnail(owner).average_rgb(),
            Some([255, 255, 255])
        );
    }

    #[test]
    fn hidden_and_destroyed_leave_pending_list() {
        let mut fx = Fixture::new(4);
        let a = fx.thumbnailed(BLACK);
        let b = fx.thumbnailed(BLACK);
        fx.generator.widget_shown(a);
        fx.generator.widget_shown(b);

        fx.generator.widget_hidden(a, &fx.manager);
        fx.generator.widget_destroyed(b);
        assert_eq!(fx.generator.pending_len(), 0);
        // Destroy leaves the record; forget drops it.
        assert!(fx.generator.has_record(b));
        fx.generator.forget(b);
        assert!(!fx.generator.has_record(b));
    }

    #[test]
    fn zero_window_never_protects() {
        let clock = ManualClock::new();
        let config = ThumbnailConfig {
            debounce_window_ms: 0,
            ..Default::default()
        };
        let mut generator = ThumbnailGenerator::with_clock(&config, Arc::new(clock.clone()));
        let mut manager = BackingStoreManager::new(2, PixelFormat::rgb888());
        let mut registry = SurfaceRegistry::new();
        let owner = registry.create();
        let size = Size::new(16, 16);
        let paint = |manager: &mut BackingStoreManager, rgba| {
            let update = PaintUpdate::solid(Rect::from_size(size), &PixelFormat::rgb888(), rgba);
            manager.prepare_backing_store(owner, size, &update).unwrap();
        };

        paint(&mut manager, BLACK);
        generator.thumbnail_for(owner, &manager);
        generator.widget_shown(owner);
        paint(&mut manager, WHITE);
        generator.widget_did_update_backing_store(owner);

        assert!(generator.cached_thumbnail(owner).is_empty());
        assert_eq!(generator.run_expired_timers(), 1);
        assert_eq!(generator.next_timer_deadline(), None);
    }
}
