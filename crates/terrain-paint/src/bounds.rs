//! # Patch Height Bounds
//!
//! Per-patch min/max heights, used by hosts for culling and brush picking.
//! Bounds are cached per tile and recomputed when the tile's revision moves.

use std::collections::HashMap;

use bevy::prelude::Resource;

use crate::tile::{Tile, TileId};

/// Height range of one patch (normalized heights)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchBounds {
    pub min: f32,
    pub max: f32,
}

impl PatchBounds {
    const EMPTY: PatchBounds = PatchBounds {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    fn include(&mut self, h: f32) {
        self.min = self.min.min(h);
        self.max = self.max.max(h);
    }
}

#[derive(Debug)]
struct CachedBounds {
    revision: u64,
    patch_size: u32,
    patches_x: u32,
    patches_y: u32,
    bounds: Vec<PatchBounds>,
}

/// Patch bounds of every tile, keyed by `TileId`
#[derive(Resource, Default, Debug)]
pub struct PatchBoundsCache {
    entries: HashMap<TileId, CachedBounds>,
}

impl PatchBoundsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds of all patches of `tile`, row-major. Adjacent patches share
    /// their edge samples.
    pub fn get(&mut self, id: TileId, tile: &Tile, patch_size: u32) -> &[PatchBounds] {
        let patch_size = patch_size.max(1);
        let stale = match self.entries.get(&id) {
            Some(cached) => cached.revision != tile.revision() || cached.patch_size != patch_size,
            None => true,
        };
        if stale {
            tracing::debug!("Recomputing patch bounds for '{}' (revision {})", tile.name, tile.revision());
            self.entries.insert(id, compute(tile, patch_size));
        }
        self.entries
            .get(&id)
            .map(|c| c.bounds.as_slice())
            .unwrap_or_default()
    }

    /// Bounds of patch (px, py), `None` outside the tile
    pub fn patch(&mut self, id: TileId, tile: &Tile, patch_size: u32, px: u32, py: u32) -> Option<PatchBounds> {
        self.get(id, tile, patch_size);
        let cached = self.entries.get(&id)?;
        if px >= cached.patches_x || py >= cached.patches_y {
            return None;
        }
        cached
            .bounds
            .get((py * cached.patches_x + px) as usize)
            .copied()
    }

    pub fn invalidate(&mut self, id: TileId) {
        self.entries.remove(&id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn patch_count(samples: u32, patch_size: u32) -> u32 {
    (samples.saturating_sub(1)).div_ceil(patch_size).max(1)
}

fn compute(tile: &Tile, patch_size: u32) -> CachedBounds {
    let heightmap = &tile.layers().heightmap;
    let (w, h) = heightmap.size();
    let patches_x = patch_count(w, patch_size);
    let patches_y = patch_count(h, patch_size);

    let mut bounds = Vec::with_capacity((patches_x * patches_y) as usize);
    for py in 0..patches_y {
        for px in 0..patches_x {
            let x0 = px * patch_size;
            let y0 = py * patch_size;
            let x1 = (x0 + patch_size).min(w.saturating_sub(1));
            let y1 = (y0 + patch_size).min(h.saturating_sub(1));

            let mut b = PatchBounds::EMPTY;
            for y in y0..=y1 {
                for x in x0..=x1 {
                    if let Some(v) = heightmap.get(x, y) {
                        b.include(v);
                    }
                }
            }
            if b.min > b.max {
                b = PatchBounds { min: 0.0, max: 0.0 };
            }
            bounds.push(b);
        }
    }

    CachedBounds {
        revision: tile.revision(),
        patch_size,
        patches_x,
        patches_y,
        bounds,
    }
}
