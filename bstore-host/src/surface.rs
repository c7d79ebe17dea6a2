//! Surface identity.
//!
//! Surfaces are identified by [`SurfaceId`], a generation-checked handle issued
//! by [`SurfaceRegistry`]. Releasing a surface bumps the generation of its slot,
//! so an id that outlives its surface can never match whatever surface reuses
//! the slot later. Caches keyed by `SurfaceId` therefore cannot alias a dead
//! surface's entry to a new one.

use std::fmt;

/// Opaque handle to a surface owner.
///
/// Only compared and hashed; it carries no reference to the surface itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId {
    index: u32,
    generation: u32,
}

impl SurfaceId {
    /// Slot index inside the registry.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this id was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    live: bool,
}

/// Arena that issues and retires [`SurfaceId`]s.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl SurfaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh id, reusing a released slot when one is available.
    pub fn create(&mut self) -> SurfaceId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.live = true;
            return SurfaceId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            live: true,
        });
        SurfaceId {
            index,
            generation: 0,
        }
    }

    /// True if `id` refers to a surface that has not been released.
    pub fn contains(&self, id: SurfaceId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.live && slot.generation == id.generation)
    }

    /// Retire `id`. Returns false if it was already stale.
    pub fn release(&mut self, id: SurfaceId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let slot = &mut self.slots[id.index as usize];
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        true
    }

    /// Number of live surfaces.
    pub fn len(&self) -> usize {
        self.live
    }

    /// True when no surface is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
