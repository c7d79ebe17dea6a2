//! The surface host: one owned context tying surfaces, backing stores and
//! thumbnails together.

use crate::backing_store::{BackingStore, PaintUpdate};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::errors::HostError;
use crate::manager::BackingStoreManager;
use crate::memory_tier::{MemoryTierOracle, SystemMemory};
use crate::surface::{SurfaceId, SurfaceRegistry};
use crate::thumbnail::{Thumbnail, ThumbnailGenerator};
use bstore_common::{Rect, Size};
use bstore_pixelbuffer::PixelFormat;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Lifecycle notifications about a surface, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface became visible.
    Shown(SurfaceId),
    /// The surface went out of view.
    Hidden(SurfaceId),
    /// A new full-resolution paint landed in the surface's backing store.
    BackingStoreUpdated(SurfaceId),
    /// The surface is going away.
    Destroyed(SurfaceId),
}

/// Owns every surface, its backing store and its thumbnail.
///
/// The generator's eviction observer is registered with the manager at
/// construction, so evicted backing stores always leave a thumbnail behind.
#[derive(Debug)]
pub struct SurfaceHost {
    registry: SurfaceRegistry,
    manager: BackingStoreManager,
    generator: ThumbnailGenerator,
}

impl SurfaceHost {
    /// Build a host using the machine's memory and the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &Config) -> Result<Self, HostError> {
        Self::with_parts(
            config,
            &SystemMemory,
            Arc::new(SystemClock),
            PixelFormat::rgb888(),
        )
    }

    /// Build a host from explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_parts(
        config: &Config,
        oracle: &dyn MemoryTierOracle,
        clock: Arc<dyn Clock>,
        format: PixelFormat,
    ) -> Result<Self, HostError> {
        config.validate()?;

        let mut manager = BackingStoreManager::from_config(&config.backing_store, oracle, format);
        let generator = ThumbnailGenerator::with_clock(&config.thumbnail, clock);
        manager.add_eviction_observer(generator.eviction_observer());

        info!(
            "Surface host ready: cache capacity {}, debounce window {:?}",
            manager.capacity(),
            generator.debounce_window()
        );

        Ok(Self {
            registry: SurfaceRegistry::new(),
            manager,
            generator,
        })
    }

    /// Register a new surface.
    pub fn create_surface(&mut self) -> SurfaceId {
        let id = self.registry.create();
        debug!("Created surface {}", id);
        id
    }

    /// Tear a surface down, dropping its backing store and thumbnail.
    ///
    /// The backing store is removed without salvaging a thumbnail.
    pub fn destroy_surface(&mut self, id: SurfaceId) -> Result<(), HostError> {
        self.check(id)?;
        self.manager.remove_backing_store(id);
        self.generator.widget_destroyed(id);
        self.generator.forget(id);
        self.registry.release(id);
        debug!("Destroyed surface {}", id);
        Ok(())
    }

    /// Paint into the surface's backing store at `size`, creating it if needed.
    ///
    /// Returns true if the caller must repaint the whole surface because the
    /// store is new and `update` did not cover it. Always false when caching
    /// is disabled, since nothing is retained.
    pub fn paint(&mut self, id: SurfaceId, size: Size, update: &PaintUpdate) -> Result<bool, HostError> {
        self.check(id)?;
        let needs_full_paint = self
            .manager
            .prepare_backing_store(id, size, update)?
            .is_some_and(|prepared| prepared.needs_full_paint);
        self.generator.widget_did_update_backing_store(id);
        Ok(needs_full_paint)
    }

    /// Scroll part of the surface's backing store.
    ///
    /// Returns false if the surface has no backing store to scroll.
    pub fn scroll(&mut self, id: SurfaceId, dx: i32, dy: i32, clip: Rect) -> Result<bool, HostError> {
        self.check(id)?;
        let Some(store) = self.manager.lookup_mut(id) else {
            return Ok(false);
        };
        store.scroll_rect(dx, dy, clip)?;
        self.generator.widget_did_update_backing_store(id);
        Ok(true)
    }

    /// Mark the surface shown or hidden.
    pub fn set_visible(&mut self, id: SurfaceId, visible: bool) -> Result<(), HostError> {
        self.check(id)?;
        if visible {
            self.generator.widget_shown(id);
        } else {
            self.generator.widget_hidden(id, &self.manager);
        }
        Ok(())
    }

    /// Best available thumbnail for the surface; empty if none can be produced.
    pub fn thumbnail(&self, id: SurfaceId) -> Result<Thumbnail, HostError> {
        self.check(id)?;
        Ok(self.generator.thumbnail_for(id, &self.manager))
    }

    /// The surface's live backing store, if any.
    pub fn backing_store(&self, id: SurfaceId) -> Result<Option<&BackingStore>, HostError> {
        self.check(id)?;
        Ok(self.manager.lookup(id))
    }

    /// Dispatch a lifecycle notification.
    pub fn handle(&mut self, event: SurfaceEvent) -> Result<(), HostError> {
        match event {
            SurfaceEvent::Shown(id) => self.set_visible(id, true),
            SurfaceEvent::Hidden(id) => self.set_visible(id, false),
            SurfaceEvent::BackingStoreUpdated(id) => {
                self.check(id)?;
                self.generator.widget_did_update_backing_store(id);
                Ok(())
            }
            SurfaceEvent::Destroyed(id) => self.destroy_surface(id),
        }
    }

    /// When [`run_expired_timers`](Self::run_expired_timers) next has work.
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.generator.next_timer_deadline()
    }

    /// Expire protected thumbnails whose window has passed.
    pub fn run_expired_timers(&mut self) -> usize {
        self.generator.run_expired_timers()
    }

    /// Number of live surfaces.
    pub fn surface_count(&self) -> usize {
        self.registry.len()
    }

    /// True if `id` is a live surface.
    pub fn contains(&self, id: SurfaceId) -> bool {
        self.registry.contains(id)
    }

    /// The backing-store manager.
    pub fn manager(&self) -> &BackingStoreManager {
        &self.manager
    }

    /// The thumbnail generator.
    pub fn generator(&self) -> &ThumbnailGenerator {
        &self.generator
    }

    fn check(&self, id: SurfaceId) -> Result<(), HostError> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(HostError::UnknownSurface(id))
        }
    }
}
