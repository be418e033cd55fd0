//! Tile registry: every tile with work in flight.
//!
//! One mutex guards the whole map. Compound operations (look up, mutate,
//! maybe remove) are methods on [`RegistryGuard`], so each runs as a single
//! critical section. Nothing awaits while the guard is held.

use std::collections::BTreeMap;

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use super::frame_set::FrameSet;
use crate::coord::TileId;

/// Map of `TileId` → [`FrameSet`], iterated in tile order.
pub(crate) struct TileRegistry<P> {
    tiles: Mutex<BTreeMap<TileId, FrameSet<P>>>,
}

impl<P> TileRegistry<P> {
    pub fn new() -> Self {
        Self {
            tiles: Mutex::new(BTreeMap::new()),
        }
    }

    /// Acquires the registry lock.
    pub fn lock(&self) -> RegistryGuard<'_, P> {
        RegistryGuard {
            tiles: self.tiles.lock(),
        }
    }
}

impl<P> Default for TileRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to the registry.
pub(crate) struct RegistryGuard<'a, P> {
    tiles: MutexGuard<'a, BTreeMap<TileId, FrameSet<P>>>,
}

impl<P> RegistryGuard<'_, P> {
    /// Returns the frame set for `tile`, creating an empty one if needed.
    pub fn get_or_create(&mut self, tile: TileId, depth: usize) -> &mut FrameSet<P> {
        self.tiles.entry(tile).or_insert_with(|| {
            trace!(%tile, depth, "Tracking tile");
            FrameSet::new(tile, depth)
        })
    }

    pub fn lookup(&self, tile: &TileId) -> Option<&FrameSet<P>> {
        self.tiles.get(tile)
    }

    pub fn lookup_mut(&mut self, tile: &TileId) -> Option<&mut FrameSet<P>> {
        self.tiles.get_mut(tile)
    }

    /// Drops the frame set for `tile` if none of its tasks is active.
    ///
    /// Every path that can end a task (resolution, cancellation) finishes
    /// here. Returns true if the set was removed.
    pub fn remove_if_idle(&mut self, tile: &TileId) -> bool {
        let idle = self.tiles.get(tile).is_some_and(FrameSet::is_idle);
        if idle {
            self.tiles.remove(tile);
            trace!(%tile, "Released tile");
        }
        idle
    }

    /// Removes and returns every frame set.
    pub fn drain(&mut self) -> Vec<FrameSet<P>> {
        std::mem::take(&mut *self.tiles).into_values().collect()
    }

    /// Tracked tiles in `TileId` order.
    pub fn tiles(&self) -> Vec<TileId> {
        self.tiles.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
