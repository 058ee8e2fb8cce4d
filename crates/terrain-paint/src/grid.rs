//! # Tile Grid
//!
//! Logical 2D arrangement of terrain tiles and its consistency state.
//!
//! A grid is built fresh from a snapshot of the tile set, either from world
//! placement (tile positions snapped to a lattice defined by one origin tile)
//! or by walking stored neighbour links. Problems never abort the build; they
//! clear one of the consistency flags and the caller decides what to do.
//!
//! ## Table of Contents
//! 1. TileGrid
//! 2. Construction (placement, connectivity)
//! 3. Insertion policy
//! 4. Validation

use std::collections::{HashMap, VecDeque};

use bevy::math::{IVec2, Vec3};

use crate::tile::{approximately, Direction, Tile, TileId, TileSet};

/// Integer (x, z) grid address of a tile
pub type TileCoord = IVec2;

// ============================================================================
// 1. TileGrid
// ============================================================================

/// Mapping between grid coordinates and tiles, plus consistency flags
#[derive(Clone, Debug)]
pub struct TileGrid {
    tiles: HashMap<TileCoord, TileId>,
    coords: HashMap<TileId, TileCoord>,

    /// World size and heightmap resolution of the first inserted tile
    reference: Option<(Vec3, (u32, u32))>,
    min: IVec2,
    max: IVec2,

    non_overlapping: bool,
    valid_grid: bool,
    same_size: bool,
    aligned_edges: bool,
    linked_neighbors: bool,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            tiles: HashMap::new(),
            coords: HashMap::new(),
            reference: None,
            min: IVec2::ZERO,
            max: IVec2::ZERO,
            non_overlapping: true,
            valid_grid: true,
            same_size: true,
            aligned_edges: true,
            linked_neighbors: true,
        }
    }
}

impl TileGrid {
    /// No two distinct tiles claimed the same coordinate
    pub fn non_overlapping(&self) -> bool {
        self.non_overlapping
    }

    /// No tile resolved to two different coordinates
    pub fn valid_grid(&self) -> bool {
        self.valid_grid
    }

    /// Every tile shares the first tile's world size and heightmap resolution
    pub fn same_size(&self) -> bool {
        self.same_size
    }

    /// Adjacent tiles meet exactly at their shared edges
    pub fn aligned_edges(&self) -> bool {
        self.aligned_edges
    }

    /// Stored neighbour links of connected tiles agree with grid adjacency
    pub fn linked_neighbors(&self) -> bool {
        self.linked_neighbors
    }

    /// All consistency checks passed
    pub fn consistent(&self) -> bool {
        self.non_overlapping
            && self.valid_grid
            && self.same_size
            && self.aligned_edges
            && self.linked_neighbors
    }

    /// Tile at a coordinate, if any
    pub fn get_tile(&self, x: i32, z: i32) -> Option<TileId> {
        self.tiles.get(&IVec2::new(x, z)).copied()
    }

    /// Coordinate of a tile, if it is in the grid
    pub fn get_coord(&self, tile: TileId) -> Option<TileCoord> {
        self.coords.get(&tile).copied()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Inclusive coordinate bounding box, `None` for an empty grid
    pub fn bounds(&self) -> Option<(TileCoord, TileCoord)> {
        if self.tiles.is_empty() {
            None
        } else {
            Some((self.min, self.max))
        }
    }

    /// All (coordinate, tile) entries in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (TileCoord, TileId)> + '_ {
        self.tiles.iter().map(|(c, t)| (*c, *t))
    }

    // ========================================================================
    // 2. Construction
    // ========================================================================

    /// Build a grid from the world placement of every tile in the set.
    ///
    /// `center` (or the first tile) defines the grid origin and cell size.
    pub fn build_from_placement(tiles: &TileSet, center: Option<TileId>) -> Self {
        let members: Vec<TileId> = tiles.ids().collect();
        Self::build_from_placement_of(tiles, &members, center)
    }

    /// Build a grid from the world placement of a subset of tiles
    pub fn build_from_placement_of(tiles: &TileSet, members: &[TileId], center: Option<TileId>) -> Self {
        let mut grid = Self::default();

        let Some(origin_id) = center.or_else(|| members.first().copied()) else {
            return grid;
        };
        let Some(origin) = tiles.get(origin_id) else {
            tracing::warn!("Grid origin tile {:?} not found", origin_id);
            return grid;
        };

        let size = origin.size();
        if size.x <= 0.0 || size.z <= 0.0 {
            tracing::warn!("Grid origin tile '{}' has degenerate size {:?}", origin.name, size);
            grid.valid_grid = false;
            return grid;
        }

        let origin_pos = origin.position();
        let scale_x = 1.0 / size.x;
        let scale_z = 1.0 / size.z;

        for &id in members {
            let Some(tile) = tiles.get(id) else { continue };
            let pos = tile.position();
            let coord = IVec2::new(
                ((pos.x - origin_pos.x) * scale_x).round() as i32,
                ((pos.z - origin_pos.z) * scale_z).round() as i32,
            );
            grid.try_insert(coord, id, tile);
        }

        grid.finish(tiles);
        grid
    }

    /// Build a grid by walking stored neighbour links from `center`, which is
    /// placed at (0, 0). Each tile is inserted at most once, so cyclic or
    /// contradictory links terminate and show up as `valid_grid == false`.
    pub fn build_from_connectivity(tiles: &TileSet, center: TileId) -> Self {
        let mut grid = Self::default();
        let mut queue = VecDeque::new();
        queue.push_back((center, IVec2::ZERO));

        while let Some((id, coord)) = queue.pop_front() {
            let Some(tile) = tiles.get(id) else { continue };
            if !grid.try_insert(coord, id, tile) {
                continue;
            }
            for direction in Direction::ALL {
                if let Some(next) = tile.neighbors.get(direction) {
                    queue.push_back((next, coord + direction.offset()));
                }
            }
        }

        grid.finish(tiles);
        grid
    }

    fn finish(&mut self, tiles: &TileSet) {
        if self.tiles.is_empty() {
            return;
        }
        self.validate(tiles);
        if self.consistent() {
            tracing::debug!("Built consistent tile grid: {} tiles", self.tiles.len());
        } else {
            tracing::warn!(
                "Tile grid inconsistent: non_overlapping={} valid_grid={} same_size={} aligned_edges={} linked_neighbors={}",
                self.non_overlapping,
                self.valid_grid,
                self.same_size,
                self.aligned_edges,
                self.linked_neighbors,
            );
        }
    }

    // ========================================================================
    // 3. Insertion policy
    // ========================================================================

    /// Insert a tile at a coordinate. The first claimant of a coordinate wins;
    /// a tile already gridded elsewhere is rejected.
    fn try_insert(&mut self, coord: TileCoord, id: TileId, tile: &Tile) -> bool {
        if let Some(&existing) = self.tiles.get(&coord) {
            if existing != id {
                tracing::debug!("Tile '{}' overlaps {:?} at {:?}", tile.name, existing, coord);
                self.non_overlapping = false;
            }
            return false;
        }

        if let Some(&other) = self.coords.get(&id) {
            if other != coord {
                tracing::debug!("Tile '{}' resolved to both {:?} and {:?}", tile.name, other, coord);
                self.valid_grid = false;
            }
            return false;
        }

        let size = tile.size();
        let resolution = tile.heightmap_resolution();
        match self.reference {
            None => {
                self.reference = Some((size, resolution));
                self.min = coord;
                self.max = coord;
            }
            Some((ref_size, ref_resolution)) => {
                if !approximately(size.x, ref_size.x)
                    || !approximately(size.z, ref_size.z)
                    || resolution != ref_resolution
                {
                    self.same_size = false;
                }
                self.min = self.min.min(coord);
                self.max = self.max.max(coord);
            }
        }

        self.tiles.insert(coord, id);
        self.coords.insert(id, coord);
        true
    }

    // ========================================================================
    // 4. Validation
    // ========================================================================

    /// Recheck neighbour links and edge alignment for every gridded tile.
    ///
    /// A snapshot in which no gridded tile has any stored link is treated as
    /// unconnected: only alignment against grid-adjacent tiles is checked.
    /// Once any tile is linked, every tile's links must match grid adjacency
    /// and be reciprocated by the linked tile.
    pub fn validate(&mut self, tiles: &TileSet) {
        self.aligned_edges = true;
        self.linked_neighbors = true;

        let any_links = self.tiles.values().any(|&id| {
            tiles
                .get(id)
                .is_some_and(|t| Direction::ALL.iter().any(|&d| t.neighbors.get(d).is_some()))
        });

        for (&coord, &id) in &self.tiles {
            let Some(tile) = tiles.get(id) else { continue };

            for direction in Direction::ALL {
                let n = coord + direction.offset();
                let expected = self.tiles.get(&n).copied();
                let stored = tile.neighbors.get(direction);

                if any_links && expected != stored {
                    self.linked_neighbors = false;
                }
                if let Some(linked) = stored {
                    if tiles.neighbor(linked, direction.opposite()) != Some(id) {
                        self.linked_neighbors = false;
                    }
                }

                for neighbor in [expected, stored].into_iter().flatten() {
                    let Some(other) = tiles.get(neighbor) else {
                        self.linked_neighbors = false;
                        continue;
                    };
                    if !edge_aligned(tile, other, direction) {
                        self.aligned_edges = false;
                    }
                }
            }
        }
    }
}

/// Whether `other`, lying in `direction` of `tile`, shares its edge exactly
fn edge_aligned(tile: &Tile, other: &Tile, direction: Direction) -> bool {
    let p = tile.position();
    let s = tile.size();
    let q = other.position();
    let t = other.size();
    match direction {
        Direction::Right => approximately(q.x, p.x + s.x) && approximately(q.z, p.z),
        Direction::Left => approximately(q.x + t.x, p.x) && approximately(q.z, p.z),
        Direction::Top => approximately(q.z, p.z + s.z) && approximately(q.x, p.x),
        Direction::Bottom => approximately(q.z + t.z, p.z) && approximately(q.x, p.x),
    }
}
