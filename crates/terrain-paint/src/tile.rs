//! # Terrain Tiles
//!
//! A tile is one terrain surface: its world placement, its raster layers, and
//! links to the four tiles around it. Tiles live in a `TileSet` arena and refer
//! to each other by `TileId`, so neighbour rings can be cyclic without any
//! ownership problems.
//!
//! ## Table of Contents
//! 1. Raster - generic 2D cell grid
//! 2. TileLayers - heightmap, splat, detail and hole rasters
//! 3. Tile + neighbour links
//! 4. TileSet - tile arena
//! 5. Float comparison

use bevy::math::{IVec2, Vec3};
use bevy::prelude::Resource;

use crate::error::{PaintError, Result};
use crate::grid::TileGrid;

// ============================================================================
// 1. Raster
// ============================================================================

/// Row-major 2D grid of cells (`data[y * width + x]`)
#[derive(Clone, Debug, PartialEq)]
pub struct Raster<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

impl<T: Copy> Raster<T> {
    /// Create a raster filled with `value`
    pub fn new(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap existing row-major cell data
    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> Result<Self> {
        if data.len() != width as usize * height as usize {
            return Err(PaintError::RasterSizeMismatch {
                expected: (width, height),
                actual: (data.len() as u32, 1),
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// (width, height)
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Cell value, or `None` outside the raster
    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        if x < self.width && y < self.height {
            Some(self.data[self.index(x, y)])
        } else {
            None
        }
    }

    /// Cell value with coordinates clamped to the raster edge.
    /// The raster must not be empty.
    pub fn get_clamped(&self, x: i64, y: i64) -> T {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.data[self.index(cx, cy)]
    }

    /// Write a cell. Returns false (and writes nothing) outside the raster.
    pub fn set(&mut self, x: u32, y: u32, value: T) -> bool {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.data[idx] = value;
            true
        } else {
            false
        }
    }

    /// Copy of the `width`×`height` block starting at (x, y), cut to the
    /// raster edge
    pub fn window(&self, x: u32, y: u32, width: u32, height: u32) -> Raster<T> {
        let x1 = x.saturating_add(width).min(self.width);
        let y1 = y.saturating_add(height).min(self.height);
        let (x0, y0) = (x.min(x1), y.min(y1));
        let mut data = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
        for row in y0..y1 {
            let start = self.index(x0, row);
            data.extend_from_slice(&self.data[start..start + (x1 - x0) as usize]);
        }
        Raster {
            width: x1 - x0,
            height: y1 - y0,
            data,
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Estimate memory usage in bytes
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<T>()
    }
}

// ============================================================================
// 2. TileLayers
// ============================================================================

/// All paintable rasters of a tile
#[derive(Clone, Debug, PartialEq)]
pub struct TileLayers {
    /// Normalized heights (0-1, scaled by the tile's `size.y` in world space)
    pub heightmap: Raster<f32>,
    /// Splat weights, one raster per texture layer; weights sum to 1 per cell
    pub alphamaps: Vec<Raster<f32>>,
    /// Detail instance counts, one raster per detail prototype
    pub details: Vec<Raster<u8>>,
    /// `true` marks a hole
    pub holes: Raster<bool>,
}

impl TileLayers {
    /// Square layers at one resolution: flat heightmap, a single fully
    /// weighted texture layer, no detail prototypes and no holes.
    pub fn with_resolution(resolution: u32) -> Self {
        Self {
            heightmap: Raster::new(resolution, resolution, 0.0),
            alphamaps: vec![Raster::new(resolution, resolution, 1.0)],
            details: Vec::new(),
            holes: Raster::new(resolution, resolution, false),
        }
    }

    /// Replace the splat layers with `count` layers; layer 0 starts fully weighted
    pub fn with_alpha_layers(mut self, count: usize) -> Self {
        let (w, h) = self
            .alphamaps
            .first()
            .map(Raster::size)
            .unwrap_or_else(|| self.heightmap.size());
        self.alphamaps = (0..count)
            .map(|i| Raster::new(w, h, if i == 0 { 1.0 } else { 0.0 }))
            .collect();
        self
    }

    /// Replace the detail layers with `count` empty layers of `resolution`
    pub fn with_detail_layers(mut self, count: usize, resolution: u32) -> Self {
        self.details = (0..count)
            .map(|_| Raster::new(resolution, resolution, 0))
            .collect();
        self
    }

    /// Resolution of the splat rasters (falls back to the heightmap's)
    pub fn alpha_size(&self) -> (u32, u32) {
        self.alphamaps
            .first()
            .map(Raster::size)
            .unwrap_or_else(|| self.heightmap.size())
    }

    /// Resolution of the detail rasters, if any prototype exists
    pub fn detail_size(&self) -> Option<(u32, u32)> {
        self.details.first().map(Raster::size)
    }

    /// Estimate memory usage in bytes
    pub fn memory_size(&self) -> usize {
        self.heightmap.memory_size()
            + self.alphamaps.iter().map(Raster::memory_size).sum::<usize>()
            + self.details.iter().map(Raster::memory_size).sum::<usize>()
            + self.holes.memory_size()
    }
}

// ============================================================================
// 3. Tile + neighbour links
// ============================================================================

/// Index of a tile inside its `TileSet`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub usize);

/// Grid directions. Left/right run along X, bottom/top along Z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Top,
    Bottom,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Top,
        Direction::Bottom,
    ];

    /// Grid coordinate offset of the neighbour in this direction
    pub fn offset(self) -> IVec2 {
        match self {
            Direction::Left => IVec2::new(-1, 0),
            Direction::Right => IVec2::new(1, 0),
            Direction::Top => IVec2::new(0, 1),
            Direction::Bottom => IVec2::new(0, -1),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Top => Direction::Bottom,
            Direction::Bottom => Direction::Top,
        }
    }
}

/// Stored links to adjacent tiles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileNeighbors {
    pub left: Option<TileId>,
    pub right: Option<TileId>,
    pub top: Option<TileId>,
    pub bottom: Option<TileId>,
}

impl TileNeighbors {
    pub fn get(&self, direction: Direction) -> Option<TileId> {
        match direction {
            Direction::Left => self.left,
            Direction::Right => self.right,
            Direction::Top => self.top,
            Direction::Bottom => self.bottom,
        }
    }

    pub fn set(&mut self, direction: Direction, tile: Option<TileId>) {
        match direction {
            Direction::Left => self.left = tile,
            Direction::Right => self.right = tile,
            Direction::Top => self.top = tile,
            Direction::Bottom => self.bottom = tile,
        }
    }
}

/// One terrain surface unit
#[derive(Clone, Debug)]
pub struct Tile {
    /// Display name (for logs)
    pub name: String,
    position: Vec3,
    size: Vec3,
    /// Links to adjacent tiles
    pub neighbors: TileNeighbors,
    layers: TileLayers,
    revision: u64,
}

impl Tile {
    /// Create a tile. `size.x`/`size.z` are the world extent, `size.y` the
    /// height scale.
    pub fn new(name: impl Into<String>, position: Vec3, size: Vec3, layers: TileLayers) -> Self {
        Self {
            name: name.into(),
            position,
            size,
            neighbors: TileNeighbors::default(),
            layers,
            revision: 0,
        }
    }

    /// World position of the tile's minimum corner
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// World size (x = width, y = height scale, z = depth)
    pub fn size(&self) -> Vec3 {
        self.size
    }

    /// Committed raster contents. Writes go through `TileSet::layers_mut`
    /// so the revision stays current.
    pub fn layers(&self) -> &TileLayers {
        &self.layers
    }

    /// Exchange the committed layers with `other` and bump the revision
    pub(crate) fn swap_layers(&mut self, other: &mut TileLayers) {
        std::mem::swap(&mut self.layers, other);
        self.bump_revision();
    }

    /// Bumped every time committed raster contents change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Heightmap resolution (width, height)
    pub fn heightmap_resolution(&self) -> (u32, u32) {
        self.layers.heightmap.size()
    }
}

// ============================================================================
// 4. TileSet
// ============================================================================

/// Arena owning every tile
#[derive(Resource, Default, Clone, Debug)]
pub struct TileSet {
    tiles: Vec<Tile>,
}

impl TileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tile and return its id
    pub fn insert(&mut self, tile: Tile) -> TileId {
        self.tiles.push(tile);
        TileId(self.tiles.len() - 1)
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0)
    }

    pub fn get_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles.get_mut(id.0)
    }

    /// Committed layers of a tile
    pub fn layers(&self, id: TileId) -> Option<&TileLayers> {
        self.get(id).map(|t| &t.layers)
    }

    /// Mutable layers of a tile. Counts as a committed change, so the
    /// tile's revision is bumped.
    pub fn layers_mut(&mut self, id: TileId) -> Option<&mut TileLayers> {
        self.get_mut(id).map(|t| {
            t.bump_revision();
            &mut t.layers
        })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TileId> + '_ {
        (0..self.tiles.len()).map(TileId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileId, &Tile)> + '_ {
        self.tiles.iter().enumerate().map(|(i, t)| (TileId(i), t))
    }

    /// Stored neighbour of `id` in `direction`
    pub fn neighbor(&self, id: TileId, direction: Direction) -> Option<TileId> {
        self.get(id).and_then(|t| t.neighbors.get(direction))
    }

    /// Link `a` and `b` in both directions (`b` lies in `direction` of `a`)
    pub fn link(&mut self, a: TileId, direction: Direction, b: TileId) {
        if let Some(tile) = self.get_mut(a) {
            tile.neighbors.set(direction, Some(b));
        }
        if let Some(tile) = self.get_mut(b) {
            tile.neighbors.set(direction.opposite(), Some(a));
        }
    }

    /// Rewrite every gridded tile's neighbour links from grid adjacency.
    /// Tiles not in the grid are left untouched.
    pub fn connect(&mut self, grid: &TileGrid) {
        let mut linked = 0usize;
        for (coord, id) in grid.iter() {
            let mut neighbors = TileNeighbors::default();
            for direction in Direction::ALL {
                let n = coord + direction.offset();
                neighbors.set(direction, grid.get_tile(n.x, n.y));
            }
            if let Some(tile) = self.get_mut(id) {
                tile.neighbors = neighbors;
                linked += 1;
            }
        }
        tracing::debug!("Connected {} tiles from grid", linked);
    }
}

// ============================================================================
// 5. Float comparison
// ============================================================================

/// Float equality with relative and absolute tolerance
#[inline]
pub fn approximately(a: f32, b: f32) -> bool {
    (b - a).abs() < (1e-6 * a.abs().max(b.abs())).max(f32::EPSILON * 8.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_bounds() {
        let mut raster = Raster::new(4, 3, 0u8);
        assert!(raster.set(3, 2, 7));
        assert!(!raster.set(4, 0, 1));
        assert_eq!(raster.get(3, 2), Some(7));
        assert_eq!(raster.get(0, 3), None);
        assert_eq!(raster.get_clamped(10, 10), 7);
        assert_eq!(raster.get_clamped(-5, -5), 0);
    }

    #[test]
    fn test_raster_window() {
        let r = Raster::from_vec(4, 3, (0..12).collect::<Vec<u32>>()).unwrap();
        let w = r.window(1, 1, 2, 2);
        assert_eq!(w.size(), (2, 2));
        assert_eq!(w.data(), &[5, 6, 9, 10]);

        // Cut at the raster edge
        let edge = r.window(3, 2, 5, 5);
        assert_eq!(edge.size(), (1, 1));
        assert_eq!(edge.get(0, 0), Some(11));
        assert!(r.window(9, 9, 2, 2).is_empty());
    }

    #[test]
    fn test_raster_from_vec_checks_len() {
        assert!(Raster::from_vec(2, 2, vec![0.0f32; 4]).is_ok());
        assert!(Raster::from_vec(2, 2, vec![0.0f32; 3]).is_err());
    }

    #[test]
    fn test_alpha_layers_start_normalized() {
        let layers = TileLayers::with_resolution(8).with_alpha_layers(3);
        assert_eq!(layers.alphamaps.len(), 3);
        let sum: f32 = layers.alphamaps.iter().map(|a| a.get(2, 2).unwrap()).sum();
        assert_eq!(sum, 1.0);
    }

    #[test]
    fn test_link_is_symmetric() {
        let mut tiles = TileSet::new();
        let layers = TileLayers::with_resolution(4);
        let a = tiles.insert(Tile::new("a", Vec3::ZERO, Vec3::splat(10.0), layers.clone()));
        let b = tiles.insert(Tile::new("b", Vec3::X * 10.0, Vec3::splat(10.0), layers));
        tiles.link(a, Direction::Right, b);
        assert_eq!(tiles.neighbor(a, Direction::Right), Some(b));
        assert_eq!(tiles.neighbor(b, Direction::Left), Some(a));
        assert_eq!(tiles.neighbor(a, Direction::Left), None);
    }

    #[test]
    fn test_layers_mut_bumps_revision() {
        let mut tiles = TileSet::new();
        let id = tiles.insert(Tile::new("a", Vec3::ZERO, Vec3::splat(10.0), TileLayers::with_resolution(4)));
        assert_eq!(tiles.get(id).unwrap().revision(), 0);
        if let Some(layers) = tiles.layers_mut(id) {
            layers.heightmap.fill(0.25);
        }
        assert_eq!(tiles.get(id).unwrap().revision(), 1);
        assert_eq!(tiles.layers(id).unwrap().heightmap.get(1, 1), Some(0.25));
        assert!(tiles.layers(TileId(7)).is_none());
    }

    #[test]
    fn test_approximately() {
        assert!(approximately(500.0, 500.0));
        assert!(approximately(500.0, 500.0 + 1e-5));
        assert!(!approximately(500.0, 500.01));
        assert!(approximately(0.0, 1e-7));
        assert!(!approximately(0.0, 1e-3));
    }
}
