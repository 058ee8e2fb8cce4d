//! # Terrain Tile Painting for Eustress Engine
//!
//! Tile-grid terrain model with brush-based raster editing. Tiles are owned by
//! a `TileSet` arena and addressed by `TileId`; a `TileGrid` maps integer
//! coordinates to tiles and reports whether the layout is a clean grid.
//!
//! ## Features
//! - Grid construction from world placement or from neighbour links
//! - Brush kernels from falloff, noise-stamp or image masks
//! - Footprint rasterization with per-tool blend rules
//! - Cross-tile strokes over up to four tiles per dab
//! - Deferred stroke apply with grouped undo/redo
//! - Cached per-patch height bounds
//!
//! ## Architecture
//! - `TileSet` / `Tile` / `TileLayers`: terrain data
//! - `TileGrid`: coordinate index and consistency flags
//! - `BrushKernel` / `KernelCache`: sampled brush strength
//! - `compute_footprint` / `rasterize`: raster-space brush application
//! - `NeighborContext`: which tiles a dab reaches
//! - `PaintTool`: height, texture, detail and hole tools
//! - `TerrainPainter` / `StrokeSession`: strokes, working buffers, history
//! - `TerrainPaintPlugin`: registers the shared resources with a Bevy `App`

pub mod blend;
pub mod bounds;
pub mod config;
pub mod error;
pub mod grid;
pub mod history;
pub mod kernel;
pub mod neighbors;
pub mod rasterizer;
pub mod stroke;
pub mod tile;
pub mod tools;

pub use bounds::{PatchBounds, PatchBoundsCache};
pub use config::PaintConfig;
pub use error::{PaintError, Result};
pub use grid::{TileCoord, TileGrid};
pub use history::{TerrainEditOp, TerrainHistory, UndoSink};
pub use kernel::{BrushKernel, BrushMask, KernelCache, MaskId, NoisePattern};
pub use neighbors::NeighborContext;
pub use rasterizer::{compute_footprint, rasterize, rasterize_in_place, BrushFootprint};
pub use stroke::{BrushSettings, StrokeSession, TerrainPainter};
pub use tile::{Direction, Raster, Tile, TileId, TileLayers, TileSet};
pub use tools::{
    PaintDetailsTool, PaintHolesTool, PaintTextureTool, PaintTool, RaiseLowerTool, RasterTarget,
    SetHeightTool, SmoothHeightTool, StrokeContext, ToolCapabilities,
};

use bevy::app::{App, Plugin};

/// Registers paint resources - add to both Engine and Client
#[derive(Default)]
pub struct TerrainPaintPlugin {
    pub config: PaintConfig,
}

impl TerrainPaintPlugin {
    pub fn with_config(config: PaintConfig) -> Self {
        Self { config }
    }
}

impl Plugin for TerrainPaintPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .init_resource::<TileSet>()
            .init_resource::<KernelCache>()
            .init_resource::<TerrainHistory>()
            .init_resource::<PatchBoundsCache>();

        tracing::info!(
            "TerrainPaintPlugin initialized (brush size {}, opacity {})",
            self.config.brush.size,
            self.config.brush.opacity
        );
    }
}
