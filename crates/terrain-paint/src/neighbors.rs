//! # Neighbour Context
//!
//! Which tiles a brush centred at some UV on a tile may also touch, and the UV
//! each of them should be painted at.
//!
//! Neighbours are taken from a fixed ring of eight slots around the tile. The
//! quadrant of the UV picks three consecutive slots, so a dab fans out to at
//! most four tiles (the source plus three). That is complete for brushes whose
//! radius is at most half a tile; larger brushes are clipped to those four.
//!
//! Adjacent tiles share a contiguous UV space offset by exactly 1.0, which
//! holds only for grids that validate as consistent.

use bevy::math::Vec2;

use crate::tile::{Direction, TileId, TileSet};

/// Source tile plus three ring neighbours
pub const MAX_NEIGHBOR_FANOUT: usize = 4;

/// Slots of the neighbour ring, in ring order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RingSlot {
    Left,
    LeftTop,
    Top,
    TopRight,
    Right,
    RightBottom,
    Bottom,
    BottomLeft,
}

impl RingSlot {
    pub const RING: [RingSlot; 8] = [
        RingSlot::Left,
        RingSlot::LeftTop,
        RingSlot::Top,
        RingSlot::TopRight,
        RingSlot::Right,
        RingSlot::RightBottom,
        RingSlot::Bottom,
        RingSlot::BottomLeft,
    ];

    /// Offset added to the source UV to get the neighbour's UV
    pub fn uv_shift(self) -> Vec2 {
        match self {
            RingSlot::Left => Vec2::new(1.0, 0.0),
            RingSlot::LeftTop => Vec2::new(1.0, -1.0),
            RingSlot::Top => Vec2::new(0.0, -1.0),
            RingSlot::TopRight => Vec2::new(-1.0, -1.0),
            RingSlot::Right => Vec2::new(-1.0, 0.0),
            RingSlot::RightBottom => Vec2::new(-1.0, 1.0),
            RingSlot::Bottom => Vec2::new(0.0, 1.0),
            RingSlot::BottomLeft => Vec2::new(1.0, 1.0),
        }
    }

    /// Ring index of the first of three slots facing the UV's quadrant
    fn quadrant_start(uv: Vec2) -> usize {
        match (uv.x >= 0.5, uv.y >= 0.5) {
            (true, true) => 2,   // top, top-right, right
            (true, false) => 4,  // right, right-bottom, bottom
            (false, false) => 6, // bottom, bottom-left, left
            (false, true) => 0,  // left, left-top, top
        }
    }
}

/// Up to four (tile, uv) pairs to paint for one dab, source first
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborContext {
    entries: [Option<(TileId, Vec2)>; MAX_NEIGHBOR_FANOUT],
    len: usize,
}

impl NeighborContext {
    /// Resolve the tiles a dab at `uv` on `tile` may touch
    pub fn resolve(tiles: &TileSet, tile: TileId, uv: Vec2) -> Self {
        let mut ctx = Self {
            entries: [None; MAX_NEIGHBOR_FANOUT],
            len: 0,
        };
        ctx.push(tile, uv);

        let start = RingSlot::quadrant_start(uv);
        for i in 0..3 {
            let slot = RingSlot::RING[(start + i) % RingSlot::RING.len()];
            if let Some(neighbor) = resolve_slot(tiles, tile, slot) {
                if !ctx.contains(neighbor) {
                    ctx.push(neighbor, uv + slot.uv_shift());
                }
            }
        }
        ctx
    }

    fn push(&mut self, tile: TileId, uv: Vec2) {
        if self.len < MAX_NEIGHBOR_FANOUT {
            self.entries[self.len] = Some((tile, uv));
            self.len += 1;
        }
    }

    /// Entries in paint order: source tile, then ring order
    pub fn entries(&self) -> impl Iterator<Item = (TileId, Vec2)> + '_ {
        self.entries.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, tile: TileId) -> bool {
        self.entries().any(|(t, _)| t == tile)
    }

    /// UV at which `tile` should be painted, if it is in the context
    pub fn uv_for(&self, tile: TileId) -> Option<Vec2> {
        self.entries().find(|(t, _)| *t == tile).map(|(_, uv)| uv)
    }

    /// Whether the four-entry fan-out reaches every tile a brush of this UV
    /// radius can touch
    pub fn covers_brush(radius_uv: f32) -> bool {
        radius_uv <= 0.5
    }
}

fn resolve_slot(tiles: &TileSet, tile: TileId, slot: RingSlot) -> Option<TileId> {
    match slot {
        RingSlot::Left => tiles.neighbor(tile, Direction::Left),
        RingSlot::Top => tiles.neighbor(tile, Direction::Top),
        RingSlot::Right => tiles.neighbor(tile, Direction::Right),
        RingSlot::Bottom => tiles.neighbor(tile, Direction::Bottom),
        RingSlot::LeftTop => resolve_corner(tiles, tile, Direction::Left, Direction::Top),
        RingSlot::TopRight => resolve_corner(tiles, tile, Direction::Right, Direction::Top),
        RingSlot::RightBottom => resolve_corner(tiles, tile, Direction::Right, Direction::Bottom),
        RingSlot::BottomLeft => resolve_corner(tiles, tile, Direction::Left, Direction::Bottom),
    }
}

/// Diagonal neighbour via the horizontal neighbour first, then the vertical
/// one. When both paths exist and disagree the horizontal path wins.
fn resolve_corner(
    tiles: &TileSet,
    tile: TileId,
    horizontal: Direction,
    vertical: Direction,
) -> Option<TileId> {
    let via_horizontal = tiles
        .neighbor(tile, horizontal)
        .and_then(|h| tiles.neighbor(h, vertical));
    let via_vertical = tiles
        .neighbor(tile, vertical)
        .and_then(|v| tiles.neighbor(v, horizontal));

    match (via_horizontal, via_vertical) {
        (Some(a), Some(b)) if a != b => {
            tracing::warn!(
                "Corner neighbour of {:?} ({:?}/{:?}) disagrees: {:?} vs {:?}; using {:?}",
                tile,
                horizontal,
                vertical,
                a,
                b,
                a
            );
            Some(a)
        }
        (Some(a), _) => Some(a),
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileGrid;
    use crate::tile::{Tile, TileLayers};
    use bevy::math::Vec3;

    /// 3×3 connected grid, ids indexed [z][x]
    fn ring_grid() -> (TileSet, [[TileId; 3]; 3]) {
        let mut tiles = TileSet::new();
        let mut ids = [[TileId(0); 3]; 3];
        for (z, row) in ids.iter_mut().enumerate() {
            for (x, id) in row.iter_mut().enumerate() {
                *id = tiles.insert(Tile::new(
                    format!("{x}_{z}"),
                    Vec3::new(x as f32 * 10.0, 0.0, z as f32 * 10.0),
                    Vec3::new(10.0, 1.0, 10.0),
                    TileLayers::with_resolution(4),
                ));
            }
        }
        let grid = TileGrid::build_from_placement(&tiles, None);
        tiles.connect(&grid);
        (tiles, ids)
    }

    #[test]
    fn test_quadrants_pick_three_neighbors() {
        let (tiles, ids) = ring_grid();
        let center = ids[1][1];

        let ne = NeighborContext::resolve(&tiles, center, Vec2::new(0.9, 0.9));
        let got: Vec<TileId> = ne.entries().map(|(t, _)| t).collect();
        assert_eq!(got, vec![center, ids[2][1], ids[2][2], ids[1][2]]);

        let se = NeighborContext::resolve(&tiles, center, Vec2::new(0.9, 0.1));
        let got: Vec<TileId> = se.entries().map(|(t, _)| t).collect();
        assert_eq!(got, vec![center, ids[1][2], ids[0][2], ids[0][1]]);

        let sw = NeighborContext::resolve(&tiles, center, Vec2::new(0.1, 0.1));
        let got: Vec<TileId> = sw.entries().map(|(t, _)| t).collect();
        assert_eq!(got, vec![center, ids[0][1], ids[0][0], ids[1][0]]);

        let nw = NeighborContext::resolve(&tiles, center, Vec2::new(0.1, 0.9));
        let got: Vec<TileId> = nw.entries().map(|(t, _)| t).collect();
        assert_eq!(got, vec![center, ids[1][0], ids[2][0], ids[2][1]]);
    }

    #[test]
    fn test_uv_shifts() {
        let (tiles, ids) = ring_grid();
        let ctx = NeighborContext::resolve(&tiles, ids[1][1], Vec2::new(0.9, 0.8));
        assert_eq!(ctx.uv_for(ids[1][1]), Some(Vec2::new(0.9, 0.8)));
        let right = ctx.uv_for(ids[1][2]).unwrap();
        assert!((right - Vec2::new(-0.1, 0.8)).length() < 1e-6);
        let top = ctx.uv_for(ids[2][1]).unwrap();
        assert!((top - Vec2::new(0.9, -0.2)).length() < 1e-6);
        let corner = ctx.uv_for(ids[2][2]).unwrap();
        assert!((corner - Vec2::new(-0.1, -0.2)).length() < 1e-6);
    }

    #[test]
    fn test_edge_tile_has_fewer_entries() {
        let (tiles, ids) = ring_grid();
        let ctx = NeighborContext::resolve(&tiles, ids[0][0], Vec2::new(0.1, 0.1));
        assert_eq!(ctx.len(), 1);
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_corner_falls_back_to_vertical_path() {
        let (mut tiles, ids) = ring_grid();
        // Break right -> top so the corner must come from top -> right
        if let Some(t) = tiles.get_mut(ids[1][2]) {
            t.neighbors.top = None;
        }
        let ctx = NeighborContext::resolve(&tiles, ids[1][1], Vec2::new(0.9, 0.9));
        assert!(ctx.contains(ids[2][2]));
    }

    #[test]
    fn test_corner_disagreement_prefers_horizontal() {
        let (mut tiles, ids) = ring_grid();
        if let Some(t) = tiles.get_mut(ids[2][1]) {
            t.neighbors.right = Some(ids[0][0]);
        }
        let ctx = NeighborContext::resolve(&tiles, ids[1][1], Vec2::new(0.9, 0.9));
        assert!(ctx.contains(ids[2][2]));
        assert!(!ctx.contains(ids[0][0]));
    }

    #[test]
    fn test_covers_brush() {
        assert!(NeighborContext::covers_brush(0.25));
        assert!(NeighborContext::covers_brush(0.5));
        assert!(!NeighborContext::covers_brush(0.75));
    }
}
