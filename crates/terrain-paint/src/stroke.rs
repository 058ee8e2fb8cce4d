//! # Stroke Application
//!
//! A stroke is a sequence of brush dabs. Dabs never write the committed tile
//! layers directly: the first touch of a tile copies its layers into a
//! working buffer (recording the committed contents for undo), every dab of
//! the stroke edits that copy, and `flush` writes the copies back.
//!
//! ## Table of Contents
//! 1. BrushSettings
//! 2. StrokeSession (per-stroke working buffers)
//! 3. TerrainPainter (owns cache, history, RNG and the open session)

use std::collections::{BTreeMap, BTreeSet};

use bevy::math::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::PaintConfig;
use crate::error::{PaintError, Result};
use crate::history::{TerrainHistory, UndoSink};
use crate::kernel::{BrushMask, KernelCache};
use crate::neighbors::NeighborContext;
use crate::rasterizer::compute_footprint;
use crate::tile::{TileId, TileLayers, TileSet};
use crate::tools::{PaintTool, StrokeContext};

/// Widest brush, in tiles, a dab rasterizes against one tile. Anything
/// larger already covers every cell the neighbour fan-out can reach.
const MAX_BRUSH_TILES: f32 = 2.0;

// ============================================================================
// 1. BrushSettings
// ============================================================================

/// Brush parameters for one dab
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushSettings {
    /// Diameter in world units
    pub size: f32,
    /// Opacity (0-1)
    pub opacity: f32,
    /// Lower instead of raise, erase instead of paint
    pub invert: bool,
}

impl BrushSettings {
    pub fn from_config(config: &PaintConfig) -> Self {
        Self {
            size: config.brush.size,
            opacity: config.brush.opacity,
            invert: false,
        }
    }

    /// Same brush with the invert modifier set
    pub fn inverted(self) -> Self {
        Self {
            invert: !self.invert,
            ..self
        }
    }
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self::from_config(&PaintConfig::default())
    }
}

// ============================================================================
// 2. StrokeSession
// ============================================================================

/// Working buffers of one stroke
#[derive(Debug)]
pub struct StrokeSession {
    description: String,
    working: BTreeMap<TileId, TileLayers>,
    recorded: BTreeSet<TileId>,
    dabs: usize,
    warned_fanout: bool,
}

impl StrokeSession {
    pub fn begin(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            working: BTreeMap::new(),
            recorded: BTreeSet::new(),
            dabs: 0,
            warned_fanout: false,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Dabs applied so far
    pub fn dabs(&self) -> usize {
        self.dabs
    }

    /// Tiles with unflushed edits
    pub fn pending_tiles(&self) -> impl Iterator<Item = TileId> + '_ {
        self.working.keys().copied()
    }

    /// Working copy of a tile's layers, if the stroke has touched it
    pub fn working_layers(&self, tile: TileId) -> Option<&TileLayers> {
        self.working.get(&tile)
    }

    /// Apply one dab centred at `uv` on `tile`, fanning out to the
    /// neighbours the brush may reach. Returns the number of cells written
    /// across all tiles.
    #[allow(clippy::too_many_arguments)]
    pub fn dab<T: PaintTool + ?Sized>(
        &mut self,
        tiles: &TileSet,
        undo: &mut dyn UndoSink,
        tool: &mut T,
        kernels: &mut KernelCache,
        mask: Option<&BrushMask>,
        ctx: &mut StrokeContext<'_>,
        tile: TileId,
        uv: Vec2,
        brush: &BrushSettings,
    ) -> Result<usize> {
        let source = tiles.get(tile).ok_or(PaintError::UnknownTile(tile))?;
        self.dabs += 1;

        if !self.warned_fanout && source.size().x > 0.0 {
            let radius_uv = brush.size / source.size().x * 0.5;
            if !NeighborContext::covers_brush(radius_uv) {
                tracing::debug!(
                    "Brush radius {:.2} tiles exceeds neighbour fan-out; painting at most 4 tiles",
                    radius_uv
                );
                self.warned_fanout = true;
            }
        }

        let mask = if tool.capabilities().has_mask { mask } else { None };
        let context = NeighborContext::resolve(tiles, tile, uv);
        let mut written = 0;

        for (id, tile_uv) in context.entries() {
            let Some(target) = tiles.get(id) else { continue };
            let Some((w, h)) = tool.target().resolution(target.layers()) else {
                continue;
            };
            if target.size().x <= 0.0 {
                continue;
            }

            let extent = (brush.size.max(0.0) / target.size().x).min(MAX_BRUSH_TILES);
            let diameter = extent * w as f32;
            let footprint = compute_footprint(w, h, tile_uv, diameter);
            if footprint.is_empty() {
                continue;
            }

            if let Err(err) = tool.check(id, target.layers()) {
                tracing::warn!("{} skipped tile '{}': {}", tool.name(), target.name, err);
                continue;
            }
            if self.recorded.insert(id) {
                undo.record(id, target.layers(), &self.description);
            }
            let layers = self
                .working
                .entry(id)
                .or_insert_with(|| target.layers().clone());

            let kernel = kernels.get_or_build(mask, footprint.kernel_size);
            match tool.apply(id, layers, &footprint, kernel, ctx) {
                Ok(n) => written += n,
                Err(err) => {
                    tracing::warn!("{} skipped tile '{}': {}", tool.name(), target.name, err);
                }
            }
        }

        Ok(written)
    }

    /// Write working buffers back to the tiles. Returns the number of tiles
    /// updated.
    pub fn flush(&mut self, tiles: &mut TileSet) -> usize {
        let mut flushed = 0;
        for (id, mut layers) in std::mem::take(&mut self.working) {
            if let Some(tile) = tiles.get_mut(id) {
                tile.swap_layers(&mut layers);
                flushed += 1;
            }
        }
        flushed
    }

    /// Flush and close the stroke
    pub fn end(mut self, tiles: &mut TileSet) -> usize {
        let flushed = self.flush(tiles);
        tracing::debug!(
            "Stroke '{}' ended: {} dabs, {} tiles",
            self.description,
            self.dabs,
            self.recorded.len()
        );
        flushed
    }

    /// Abort the stroke. Edits made so far are still written back.
    pub fn cancel(mut self, tiles: &mut TileSet) -> usize {
        let flushed = self.flush(tiles);
        tracing::debug!("Stroke '{}' cancelled after {} dabs", self.description, self.dabs);
        flushed
    }
}

impl Drop for StrokeSession {
    fn drop(&mut self) {
        if !self.working.is_empty() {
            tracing::warn!(
                "Stroke '{}' dropped with {} unflushed tiles",
                self.description,
                self.working.len()
            );
        }
    }
}

// ============================================================================
// 3. TerrainPainter
// ============================================================================

/// Paint state that outlives a stroke
pub struct TerrainPainter {
    pub config: PaintConfig,
    kernels: KernelCache,
    history: TerrainHistory,
    rng: StdRng,
    mask: Option<BrushMask>,
    session: Option<StrokeSession>,
}

impl TerrainPainter {
    pub fn new(config: PaintConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.detail.seed);
        let mask = Some(BrushMask::falloff(64, config.brush.hardness));
        Self {
            config,
            kernels: KernelCache::new(),
            history: TerrainHistory::new(),
            rng,
            mask,
            session: None,
        }
    }

    /// Replace the brush mask (`None` paints with a uniform kernel)
    pub fn set_mask(&mut self, mask: Option<BrushMask>) {
        self.mask = mask;
    }

    pub fn mask(&self) -> Option<&BrushMask> {
        self.mask.as_ref()
    }

    /// Brush settings from the configured defaults
    pub fn brush(&self) -> BrushSettings {
        BrushSettings::from_config(&self.config)
    }

    pub fn is_painting(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&StrokeSession> {
        self.session.as_ref()
    }

    /// Open a stroke. An open stroke is ended first.
    pub fn begin_stroke(&mut self, tiles: &mut TileSet, description: impl Into<String>) {
        self.end_stroke(tiles);
        self.session = Some(StrokeSession::begin(description));
    }

    /// Apply one dab, opening a stroke named after the tool if none is open
    pub fn paint<T: PaintTool + ?Sized>(
        &mut self,
        tiles: &TileSet,
        tool: &mut T,
        tile: TileId,
        uv: Vec2,
        brush: &BrushSettings,
    ) -> Result<usize> {
        let session = self
            .session
            .get_or_insert_with(|| StrokeSession::begin(tool.edit_op(brush.invert).description()));
        let mut ctx = StrokeContext {
            opacity: brush.opacity,
            invert: brush.invert,
            rng: &mut self.rng,
        };
        session.dab(
            tiles,
            &mut self.history,
            tool,
            &mut self.kernels,
            self.mask.as_ref(),
            &mut ctx,
            tile,
            uv,
            brush,
        )
    }

    /// Write pending edits back without closing the stroke
    pub fn flush(&mut self, tiles: &mut TileSet) -> usize {
        self.session.as_mut().map(|s| s.flush(tiles)).unwrap_or(0)
    }

    /// Flush and close the stroke into one undo entry
    pub fn end_stroke(&mut self, tiles: &mut TileSet) -> usize {
        let flushed = self.session.take().map(|s| s.end(tiles)).unwrap_or(0);
        self.history.commit_group();
        flushed
    }

    /// Abort the stroke; edits so far are kept and undoable
    pub fn cancel_stroke(&mut self, tiles: &mut TileSet) -> usize {
        let flushed = self.session.take().map(|s| s.cancel(tiles)).unwrap_or(0);
        self.history.commit_group();
        flushed
    }

    pub fn undo(&mut self, tiles: &mut TileSet) -> Option<String> {
        self.end_stroke(tiles);
        let description = self.history.undo(tiles)?;
        tracing::info!("Undo: {}", description);
        Some(description)
    }

    pub fn redo(&mut self, tiles: &mut TileSet) -> Option<String> {
        self.end_stroke(tiles);
        let description = self.history.redo(tiles)?;
        tracing::info!("Redo: {}", description);
        Some(description)
    }

    pub fn history(&self) -> &TerrainHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut TerrainHistory {
        &mut self.history
    }

    pub fn kernels(&self) -> &KernelCache {
        &self.kernels
    }
}

impl Default for TerrainPainter {
    fn default() -> Self {
        Self::new(PaintConfig::default())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileGrid;
    use crate::tile::Tile;
    use crate::tools::{PaintDetailsTool, PaintTextureTool, RaiseLowerTool};
    use bevy::math::Vec3;

    /// 2×2 grid of 500-unit tiles at 512², connected; ids indexed [z][x]
    fn two_by_two() -> (TileSet, TileGrid, [[TileId; 2]; 2]) {
        let mut tiles = TileSet::new();
        let mut ids = [[TileId(0); 2]; 2];
        for (z, row) in ids.iter_mut().enumerate() {
            for (x, id) in row.iter_mut().enumerate() {
                *id = tiles.insert(Tile::new(
                    format!("tile_{x}_{z}"),
                    Vec3::new(x as f32 * 500.0, 0.0, z as f32 * 500.0),
                    Vec3::new(500.0, 100.0, 500.0),
                    TileLayers::with_resolution(512),
                ));
            }
        }
        let grid = TileGrid::build_from_placement(&tiles, None);
        tiles.connect(&grid);
        (tiles, grid, ids)
    }

    fn brush(size: f32) -> BrushSettings {
        BrushSettings {
            size,
            opacity: 1.0,
            invert: false,
        }
    }

    fn height(tiles: &TileSet, id: TileId, x: u32, y: u32) -> f32 {
        tiles.get(id).unwrap().layers().heightmap.get(x, y).unwrap()
    }

    #[test]
    fn test_dab_crosses_into_east_tile() {
        let (mut tiles, grid, ids) = two_by_two();
        assert!(grid.consistent());
        assert_eq!(grid.get_tile(1, 0), Some(ids[0][1]));

        let uv = Vec2::new(0.95, 0.5);
        let context = NeighborContext::resolve(&tiles, ids[0][0], uv);
        let east_uv = context.uv_for(ids[0][1]).unwrap();
        assert!((east_uv.x - (0.95 - 1.0)).abs() < 1e-6);
        assert_eq!(east_uv.y, 0.5);

        let mut painter = TerrainPainter::default();
        painter.set_mask(None);
        let mut tool = RaiseLowerTool::new(0.01);
        let written = painter.paint(&tiles, &mut tool, ids[0][0], uv, &brush(100.0)).unwrap();
        assert!(written > 0);
        painter.end_stroke(&mut tiles);

        // Source tile around the dab, east tile near its left edge
        assert!(height(&tiles, ids[0][0], 500, 256) > 0.0);
        assert!(height(&tiles, ids[0][1], 0, 256) > 0.0);
        assert!(height(&tiles, ids[0][1], 10, 256) > 0.0);
        assert_eq!(height(&tiles, ids[0][1], 100, 256), 0.0);

        // The north tiles are out of reach
        let north = tiles.get(ids[1][0]).unwrap().layers();
        assert!(north.heightmap.data().iter().all(|&h| h == 0.0));
        assert_eq!(tiles.get(ids[1][0]).unwrap().revision(), 0);
        assert_eq!(tiles.get(ids[1][1]).unwrap().revision(), 0);
    }

    #[test]
    fn test_edits_are_deferred_until_flush() {
        let (mut tiles, _, ids) = two_by_two();
        let mut painter = TerrainPainter::default();
        let mut tool = RaiseLowerTool::new(0.05);
        let uv = Vec2::splat(0.5);

        painter.begin_stroke(&mut tiles, "Raise");
        painter.paint(&tiles, &mut tool, ids[0][0], uv, &brush(50.0)).unwrap();
        assert_eq!(height(&tiles, ids[0][0], 256, 256), 0.0);
        let working = painter.session().unwrap().working_layers(ids[0][0]).unwrap();
        assert!(working.heightmap.get(256, 256).unwrap() > 0.0);

        assert_eq!(painter.flush(&mut tiles), 1);
        assert!(height(&tiles, ids[0][0], 256, 256) > 0.0);
        assert_eq!(tiles.get(ids[0][0]).unwrap().revision(), 1);
        assert!(painter.is_painting());

        // Cancelling still writes back what was painted
        painter.paint(&tiles, &mut tool, ids[0][0], uv, &brush(50.0)).unwrap();
        let before = height(&tiles, ids[0][0], 256, 256);
        assert_eq!(painter.cancel_stroke(&mut tiles), 1);
        assert!(height(&tiles, ids[0][0], 256, 256) > before);
        assert!(!painter.is_painting());
    }

    #[test]
    fn test_stroke_undo_redo() {
        let (mut tiles, _, ids) = two_by_two();
        let mut painter = TerrainPainter::default();
        let mut tool = RaiseLowerTool::new(0.1);
        let original = tiles.clone();

        painter.begin_stroke(&mut tiles, "Raise terrain");
        for step in 0..5 {
            let uv = Vec2::new(0.9 + step as f32 * 0.01, 0.5);
            painter.paint(&tiles, &mut tool, ids[0][0], uv, &brush(60.0)).unwrap();
        }
        painter.end_stroke(&mut tiles);
        let painted: Vec<TileLayers> = tiles.iter().map(|(_, t)| t.layers().clone()).collect();

        assert_eq!(painter.history().undo_count(), 1);
        assert_eq!(painter.undo(&mut tiles).as_deref(), Some("Raise terrain"));
        for ((_, a), (_, b)) in tiles.iter().zip(original.iter()) {
            assert_eq!(a.layers(), b.layers());
        }

        assert_eq!(painter.redo(&mut tiles).as_deref(), Some("Raise terrain"));
        for ((_, t), layers) in tiles.iter().zip(painted.iter()) {
            assert_eq!(t.layers(), layers);
        }
    }

    #[test]
    fn test_raise_then_lower_stroke_round_trips() {
        let (mut tiles, _, ids) = two_by_two();
        if let Some(layers) = tiles.layers_mut(ids[0][0]) {
            layers.heightmap.fill(0.5);
        }
        let mut painter = TerrainPainter::default();
        painter.set_mask(None);
        let mut tool = RaiseLowerTool::new(0.05);
        let uv = Vec2::splat(0.3);

        painter.paint(&tiles, &mut tool, ids[0][0], uv, &brush(40.0)).unwrap();
        painter.end_stroke(&mut tiles);
        painter.paint(&tiles, &mut tool, ids[0][0], uv, &brush(40.0).inverted()).unwrap();
        painter.end_stroke(&mut tiles);

        let heights = tiles.get(ids[0][0]).unwrap().layers().heightmap.data();
        assert!(heights.iter().all(|&h| (h - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_stochastic_detail_density_accumulates() {
        let mut tiles = TileSet::new();
        let id = tiles.insert(Tile::new(
            "detail",
            Vec3::ZERO,
            Vec3::new(500.0, 100.0, 500.0),
            TileLayers::with_resolution(65).with_detail_layers(1, 64),
        ));
        let mut painter = TerrainPainter::default();
        let mut tool = PaintDetailsTool::new(0, 16);
        let settings = BrushSettings {
            size: 10.0,
            opacity: 0.001,
            invert: false,
        };

        for _ in 0..1000 {
            painter.paint(&tiles, &mut tool, id, Vec2::splat(0.5), &settings).unwrap();
        }
        painter.end_stroke(&mut tiles);

        let count = tiles.get(id).unwrap().layers().details[0].get(32, 32).unwrap();
        assert!(count >= 3, "count stayed at {count}");
        assert!(count <= 16);
    }

    #[test]
    fn test_missing_layer_skips_tile() {
        let (mut tiles, _, ids) = two_by_two();
        let mut painter = TerrainPainter::default();
        let mut tool = PaintTextureTool::new(3);
        let written = painter
            .paint(&tiles, &mut tool, ids[0][0], Vec2::splat(0.5), &brush(50.0))
            .unwrap();
        assert_eq!(written, 0);
        painter.end_stroke(&mut tiles);
        assert!(tiles.get(ids[0][0]).unwrap().layers().alphamaps[0]
            .data()
            .iter()
            .all(|&w| w == 1.0));

        // Nothing recorded for undo and the tile was never rewritten
        assert_eq!(painter.history().undo_count(), 0);
        assert!(!painter.history().can_undo());
        assert_eq!(tiles.get(ids[0][0]).unwrap().revision(), 0);
    }

    #[test]
    fn test_stroke_description_follows_tool() {
        let (mut tiles, _, ids) = two_by_two();
        let mut painter = TerrainPainter::default();
        let mut tool = RaiseLowerTool::new(0.01);
        let uv = Vec2::splat(0.5);

        painter.paint(&tiles, &mut tool, ids[0][0], uv, &brush(20.0)).unwrap();
        painter.end_stroke(&mut tiles);
        assert_eq!(painter.history().undo_description(), Some("Raise terrain"));

        painter.paint(&tiles, &mut tool, ids[0][0], uv, &brush(20.0).inverted()).unwrap();
        painter.end_stroke(&mut tiles);
        assert_eq!(painter.history().undo_description(), Some("Lower terrain"));

        let mut texture = PaintTextureTool::new(0);
        painter.paint(&tiles, &mut texture, ids[0][0], uv, &brush(20.0)).unwrap();
        painter.end_stroke(&mut tiles);
        assert_eq!(painter.undo(&mut tiles).as_deref(), Some("Paint texture"));
    }

    #[test]
    fn test_oversized_brush_kernel_is_capped() {
        let mut tiles = TileSet::new();
        let id = tiles.insert(Tile::new(
            "small",
            Vec3::ZERO,
            Vec3::new(500.0, 100.0, 500.0),
            TileLayers::with_resolution(64),
        ));
        let mut painter = TerrainPainter::default();
        painter.set_mask(None);
        let mut tool = RaiseLowerTool::new(0.01);

        let written = painter
            .paint(&tiles, &mut tool, id, Vec2::splat(0.5), &brush(50_000.0))
            .unwrap();
        painter.end_stroke(&mut tiles);

        assert_eq!(written, 64 * 64);
        let size = painter.kernels().size().unwrap();
        assert!(size <= 2 * 64 + 1, "kernel size {size}");
        assert!(height(&tiles, id, 0, 0) > 0.0);
        assert!(height(&tiles, id, 63, 63) > 0.0);
    }

    #[test]
    fn test_unknown_tile_is_an_error() {
        let (tiles, _, _) = two_by_two();
        let mut painter = TerrainPainter::default();
        let mut tool = RaiseLowerTool::new(0.01);
        let result = painter.paint(&tiles, &mut tool, TileId(99), Vec2::splat(0.5), &brush(10.0));
        assert!(matches!(result, Err(PaintError::UnknownTile(TileId(99)))));
    }
}
