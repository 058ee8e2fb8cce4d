//! # Paint Tools
//!
//! Each tool blends one brush dab into a tile's layers. The stroke machinery
//! (neighbour fan-out, working buffers, undo) lives in `stroke`; a tool only
//! sees one tile, one footprint and one kernel at a time.
//!
//! ## Tools
//! - `RaiseLowerTool`: additive height nudge, inverted to lower
//! - `SetHeightTool`: pull heights toward a target (flatten)
//! - `SmoothHeightTool`: blur with a peaks/valleys bias
//! - `PaintTextureTool`: raise one splat layer, renormalize the rest
//! - `PaintDetailsTool`: stochastic detail instance counts
//! - `PaintHolesTool`: threshold write to the hole mask

use rand::rngs::StdRng;
use rand::Rng;

use crate::blend::{self, SmoothWeights};
use crate::config::PaintConfig;
use crate::error::{PaintError, Result};
use crate::history::TerrainEditOp;
use crate::kernel::BrushKernel;
use crate::rasterizer::{rasterize_in_place, BrushFootprint};
use crate::tile::{TileId, TileLayers};

// ============================================================================
// Tool Interface
// ============================================================================

/// Optional features a tool exposes to the host UI
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToolCapabilities {
    /// Strength is shaped by the brush mask (otherwise a uniform kernel is used)
    pub has_mask: bool,
    /// Paints a selectable attribute (texture layer, detail prototype)
    pub has_attributes: bool,
    /// Has tool-specific settings beyond size/opacity
    pub has_tool_settings: bool,
}

/// Which raster a tool paints, and so which resolution footprints use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterTarget {
    Height,
    Alpha,
    Detail,
    Holes,
}

impl RasterTarget {
    /// Resolution of the targeted raster, `None` if the tile has none
    pub fn resolution(self, layers: &TileLayers) -> Option<(u32, u32)> {
        let size = match self {
            RasterTarget::Height => layers.heightmap.size(),
            RasterTarget::Alpha => {
                if layers.alphamaps.is_empty() {
                    return None;
                }
                layers.alpha_size()
            }
            RasterTarget::Detail => layers.detail_size()?,
            RasterTarget::Holes => layers.holes.size(),
        };
        (size.0 > 0 && size.1 > 0).then_some(size)
    }
}

/// Per-stroke parameters handed to tools
pub struct StrokeContext<'a> {
    /// Brush opacity (0-1)
    pub opacity: f32,
    /// Invert modifier (lower instead of raise, erase instead of paint)
    pub invert: bool,
    /// Randomness for stochastic tools
    pub rng: &'a mut StdRng,
}

impl StrokeContext<'_> {
    /// +1, or -1 under the invert modifier
    pub fn sign(&self) -> f32 {
        if self.invert {
            -1.0
        } else {
            1.0
        }
    }
}

/// A brush tool
pub trait PaintTool {
    /// Display name
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> ToolCapabilities;

    fn target(&self) -> RasterTarget;

    /// History entry kind for a stroke of this tool
    fn edit_op(&self, invert: bool) -> TerrainEditOp;

    /// Whether `layers` has what this tool paints. Runs before the tile is
    /// recorded for undo, so a failing tile is left untouched.
    fn check(&self, _tile: TileId, _layers: &TileLayers) -> Result<()> {
        Ok(())
    }

    /// Blend one dab into `layers`. Returns the number of cells written.
    fn apply(
        &mut self,
        tile: TileId,
        layers: &mut TileLayers,
        footprint: &BrushFootprint,
        kernel: &BrushKernel,
        ctx: &mut StrokeContext<'_>,
    ) -> Result<usize>;
}

// ============================================================================
// Height Tools
// ============================================================================

/// Raise (or, inverted, lower) heights by `delta` per dab at full strength
#[derive(Clone, Debug)]
pub struct RaiseLowerTool {
    pub delta: f32,
}

impl RaiseLowerTool {
    pub fn new(delta: f32) -> Self {
        Self { delta }
    }

    pub fn from_config(config: &PaintConfig) -> Self {
        Self::new(config.height.delta)
    }
}

impl PaintTool for RaiseLowerTool {
    fn name(&self) -> &'static str {
        "Raise or Lower Terrain"
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            has_mask: true,
            has_attributes: false,
            has_tool_settings: true,
        }
    }

    fn target(&self) -> RasterTarget {
        RasterTarget::Height
    }

    fn edit_op(&self, invert: bool) -> TerrainEditOp {
        if invert {
            TerrainEditOp::Lower
        } else {
            TerrainEditOp::Raise
        }
    }

    fn apply(
        &mut self,
        _tile: TileId,
        layers: &mut TileLayers,
        footprint: &BrushFootprint,
        kernel: &BrushKernel,
        ctx: &mut StrokeContext<'_>,
    ) -> Result<usize> {
        let (delta, sign, opacity) = (self.delta, ctx.sign(), ctx.opacity);
        Ok(rasterize_in_place(footprint, kernel, &mut layers.heightmap, |h, s| {
            blend::raise_lower(h, delta, sign, opacity, s).clamp(0.0, 1.0)
        }))
    }
}

/// Pull heights toward a fixed target
#[derive(Clone, Debug)]
pub struct SetHeightTool {
    /// Normalized target height (0-1)
    pub target_height: f32,
}

impl SetHeightTool {
    pub fn new(target_height: f32) -> Self {
        Self {
            target_height: target_height.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &PaintConfig) -> Self {
        Self::new(config.height.target_height)
    }
}

impl PaintTool for SetHeightTool {
    fn name(&self) -> &'static str {
        "Set Height"
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            has_mask: true,
            has_attributes: false,
            has_tool_settings: true,
        }
    }

    fn target(&self) -> RasterTarget {
        RasterTarget::Height
    }

    fn edit_op(&self, _invert: bool) -> TerrainEditOp {
        TerrainEditOp::SetHeight
    }

    fn apply(
        &mut self,
        _tile: TileId,
        layers: &mut TileLayers,
        footprint: &BrushFootprint,
        kernel: &BrushKernel,
        ctx: &mut StrokeContext<'_>,
    ) -> Result<usize> {
        let (target, opacity) = (self.target_height, ctx.opacity);
        Ok(rasterize_in_place(footprint, kernel, &mut layers.heightmap, |h, s| {
            blend::set_height(h, target, opacity, s)
        }))
    }
}

/// Blur heights toward their neighbourhood mean
#[derive(Clone, Debug)]
pub struct SmoothHeightTool {
    /// +1 only lowers peaks, -1 only fills valleys
    pub direction: f32,
    pub blur_radius: u32,
}

impl SmoothHeightTool {
    pub fn new(direction: f32, blur_radius: u32) -> Self {
        Self {
            direction: direction.clamp(-1.0, 1.0),
            blur_radius: blur_radius.max(1),
        }
    }

    pub fn from_config(config: &PaintConfig) -> Self {
        Self::new(config.height.smooth_direction, config.height.blur_radius)
    }
}

impl PaintTool for SmoothHeightTool {
    fn name(&self) -> &'static str {
        "Smooth Height"
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            has_mask: true,
            has_attributes: false,
            has_tool_settings: true,
        }
    }

    fn target(&self) -> RasterTarget {
        RasterTarget::Height
    }

    fn edit_op(&self, _invert: bool) -> TerrainEditOp {
        TerrainEditOp::Smooth
    }

    fn apply(
        &mut self,
        _tile: TileId,
        layers: &mut TileLayers,
        footprint: &BrushFootprint,
        kernel: &BrushKernel,
        ctx: &mut StrokeContext<'_>,
    ) -> Result<usize> {
        if footprint.is_empty() {
            return Ok(0);
        }
        // Blur reads must not see cells already written this dab. Only the
        // footprint grown by the blur radius is read.
        let radius = self.blur_radius;
        let x0 = (footprint.min.x as u32).saturating_sub(radius);
        let y0 = (footprint.min.y as u32).saturating_sub(radius);
        let source = layers.heightmap.window(
            x0,
            y0,
            footprint.max.x as u32 + radius - x0,
            footprint.max.y as u32 + radius - y0,
        );

        let weights = SmoothWeights::from_direction(self.direction);
        let opacity = ctx.opacity;
        let mut written = 0;
        for cell in footprint.cells() {
            let strength = opacity * kernel.sample(cell.brush.x, cell.brush.y);
            let value = blend::smooth(&source, cell.x - x0, cell.y - y0, radius, weights, strength);
            if layers.heightmap.set(cell.x, cell.y, value) {
                written += 1;
            }
        }
        Ok(written)
    }
}

// ============================================================================
// Texture Tool
// ============================================================================

/// Paint one splat layer up; the other layers give way proportionally
#[derive(Clone, Debug)]
pub struct PaintTextureTool {
    pub layer: usize,
    /// Weight the painted layer converges to
    pub target: f32,
    scratch: Vec<f32>,
}

impl PaintTextureTool {
    pub fn new(layer: usize) -> Self {
        Self {
            layer,
            target: 1.0,
            scratch: Vec::new(),
        }
    }
}

impl PaintTool for PaintTextureTool {
    fn name(&self) -> &'static str {
        "Paint Texture"
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            has_mask: true,
            has_attributes: true,
            has_tool_settings: true,
        }
    }

    fn target(&self) -> RasterTarget {
        RasterTarget::Alpha
    }

    fn check(&self, tile: TileId, layers: &TileLayers) -> Result<()> {
        let count = layers.alphamaps.len();
        if self.layer >= count {
            return Err(PaintError::LayerOutOfRange {
                tile,
                kind: "texture",
                index: self.layer,
                count,
            });
        }
        Ok(())
    }

    fn edit_op(&self, _invert: bool) -> TerrainEditOp {
        TerrainEditOp::PaintTexture
    }

    fn apply(
        &mut self,
        tile: TileId,
        layers: &mut TileLayers,
        footprint: &BrushFootprint,
        kernel: &BrushKernel,
        ctx: &mut StrokeContext<'_>,
    ) -> Result<usize> {
        self.check(tile, layers)?;
        let count = layers.alphamaps.len();

        let mut written = 0;
        for cell in footprint.cells() {
            self.scratch.clear();
            for alpha in &layers.alphamaps {
                match alpha.get(cell.x, cell.y) {
                    Some(w) => self.scratch.push(w),
                    None => break,
                }
            }
            if self.scratch.len() != count {
                continue;
            }

            let t = ctx.opacity * kernel.sample(cell.brush.x, cell.brush.y);
            blend::paint_splat(&mut self.scratch, self.layer, self.target, t);

            for (alpha, &w) in layers.alphamaps.iter_mut().zip(&self.scratch) {
                alpha.set(cell.x, cell.y, w);
            }
            written += 1;
        }
        Ok(written)
    }
}

// ============================================================================
// Detail Tool
// ============================================================================

/// Paint detail instance counts with stochastic rounding
#[derive(Clone, Debug)]
pub struct PaintDetailsTool {
    pub layer: usize,
    pub target_density: u8,
    pub max_density: u8,
}

impl PaintDetailsTool {
    pub fn new(layer: usize, target_density: u8) -> Self {
        Self {
            layer,
            target_density,
            max_density: u8::MAX,
        }
    }

    pub fn from_config(layer: usize, config: &PaintConfig) -> Self {
        Self {
            layer,
            target_density: config.detail.target_density,
            max_density: config.detail.max_density,
        }
    }
}

impl PaintTool for PaintDetailsTool {
    fn name(&self) -> &'static str {
        "Paint Details"
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            has_mask: true,
            has_attributes: true,
            has_tool_settings: true,
        }
    }

    fn target(&self) -> RasterTarget {
        RasterTarget::Detail
    }

    fn check(&self, tile: TileId, layers: &TileLayers) -> Result<()> {
        let count = layers.details.len();
        if self.layer >= count {
            return Err(PaintError::LayerOutOfRange {
                tile,
                kind: "detail",
                index: self.layer,
                count,
            });
        }
        Ok(())
    }

    fn edit_op(&self, _invert: bool) -> TerrainEditOp {
        TerrainEditOp::PaintDetails
    }

    fn apply(
        &mut self,
        tile: TileId,
        layers: &mut TileLayers,
        footprint: &BrushFootprint,
        kernel: &BrushKernel,
        ctx: &mut StrokeContext<'_>,
    ) -> Result<usize> {
        let count = layers.details.len();
        let Some(detail) = layers.details.get_mut(self.layer) else {
            return Err(PaintError::LayerOutOfRange {
                tile,
                kind: "detail",
                index: self.layer,
                count,
            });
        };

        let target = ctx.sign() * self.target_density as f32;
        let (opacity, max) = (ctx.opacity, self.max_density);
        let rng = &mut *ctx.rng;
        Ok(rasterize_in_place(footprint, kernel, detail, |n, s| {
            blend::detail_density(n, target, opacity * s, rng.gen::<f32>(), max)
        }))
    }
}

// ============================================================================
// Holes Tool
// ============================================================================

/// Cut (or, inverted, fill) terrain holes
#[derive(Clone, Debug)]
pub struct PaintHolesTool {
    pub threshold: f32,
}

impl PaintHolesTool {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &PaintConfig) -> Self {
        Self::new(config.holes.threshold)
    }
}

impl PaintTool for PaintHolesTool {
    fn name(&self) -> &'static str {
        "Paint Holes"
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            has_mask: true,
            has_attributes: false,
            has_tool_settings: false,
        }
    }

    fn target(&self) -> RasterTarget {
        RasterTarget::Holes
    }

    fn edit_op(&self, _invert: bool) -> TerrainEditOp {
        TerrainEditOp::PaintHoles
    }

    fn apply(
        &mut self,
        _tile: TileId,
        layers: &mut TileLayers,
        footprint: &BrushFootprint,
        kernel: &BrushKernel,
        ctx: &mut StrokeContext<'_>,
    ) -> Result<usize> {
        let (sign, opacity, threshold) = (ctx.sign(), ctx.opacity, self.threshold);
        Ok(rasterize_in_place(footprint, kernel, &mut layers.holes, |h, s| {
            blend::hole(h, sign, opacity * s, threshold)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::compute_footprint;
    use bevy::math::Vec2;
    use rand::SeedableRng;

    fn layers() -> TileLayers {
        let mut layers = TileLayers::with_resolution(16)
            .with_alpha_layers(3)
            .with_detail_layers(1, 16);
        layers.heightmap.fill(0.5);
        layers
    }

    fn dab<T: PaintTool>(tool: &mut T, layers: &mut TileLayers, opacity: f32, invert: bool) -> usize {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = StrokeContext { opacity, invert, rng: &mut rng };
        let fp = compute_footprint(16, 16, Vec2::splat(0.5), 4.0);
        let kernel = BrushKernel::uniform(4);
        tool.apply(TileId(0), layers, &fp, &kernel, &mut ctx).unwrap()
    }

    #[test]
    fn test_raise_then_lower_restores_heights() {
        let mut l = layers();
        let before = l.heightmap.clone();
        let mut tool = RaiseLowerTool::new(0.1);

        assert_eq!(dab(&mut tool, &mut l, 0.7, false), 16);
        assert!((l.heightmap.get(8, 8).unwrap() - 0.57).abs() < 1e-5);
        dab(&mut tool, &mut l, 0.7, true);

        for (a, b) in l.heightmap.data().iter().zip(before.data()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_set_height_full_opacity() {
        let mut l = layers();
        dab(&mut SetHeightTool::new(0.2), &mut l, 1.0, false);
        assert_eq!(l.heightmap.get(8, 8), Some(0.2));
        assert_eq!(l.heightmap.get(0, 0), Some(0.5));
    }

    #[test]
    fn test_smooth_flattens_a_spike() {
        let mut l = layers();
        l.heightmap.set(8, 8, 1.0);
        dab(&mut SmoothHeightTool::new(0.0, 1), &mut l, 1.0, false);
        let h = l.heightmap.get(8, 8).unwrap();
        assert!(h < 1.0 && h > 0.5);
    }

    #[test]
    fn test_smooth_matches_full_raster_blur() {
        use crate::rasterizer::rasterize;

        let mut rng = StdRng::seed_from_u64(7);
        let mut field = TileLayers::with_resolution(16);
        for h in field.heightmap.data_mut() {
            *h = rng.gen::<f32>();
        }
        let kernel = BrushKernel::uniform(6);
        let weights = SmoothWeights::from_direction(0.0);

        for uv in [Vec2::splat(0.5), Vec2::new(0.02, 0.98), Vec2::new(0.99, 0.0)] {
            let fp = compute_footprint(16, 16, uv, 6.0);
            let mut expected = field.heightmap.clone();
            rasterize(&fp, &kernel, &field.heightmap, &mut expected, |cell| {
                blend::smooth(cell.source, cell.x, cell.y, 2, weights, 0.8 * cell.strength)
            });

            let mut l = field.clone();
            let mut ctx = StrokeContext { opacity: 0.8, invert: false, rng: &mut rng };
            let mut tool = SmoothHeightTool::new(0.0, 2);
            let written = tool.apply(TileId(0), &mut l, &fp, &kernel, &mut ctx).unwrap();
            assert_eq!(written, fp.area(), "{uv:?}");
            for (a, b) in l.heightmap.data().iter().zip(expected.data()) {
                assert!((a - b).abs() < 1e-6, "{uv:?}");
            }
        }
    }

    #[test]
    fn test_edit_ops_follow_invert() {
        let raise = RaiseLowerTool::new(0.1);
        assert_eq!(raise.edit_op(false), TerrainEditOp::Raise);
        assert_eq!(raise.edit_op(true), TerrainEditOp::Lower);
        assert_eq!(SmoothHeightTool::new(0.0, 1).edit_op(true), TerrainEditOp::Smooth);
        assert_eq!(PaintHolesTool::new(0.5).edit_op(true), TerrainEditOp::PaintHoles);
    }

    #[test]
    fn test_check_rejects_missing_layers() {
        let l = layers();
        assert!(PaintTextureTool::new(2).check(TileId(0), &l).is_ok());
        assert!(PaintTextureTool::new(3).check(TileId(0), &l).is_err());
        assert!(PaintDetailsTool::new(1, 16).check(TileId(0), &l).is_err());
        assert!(RaiseLowerTool::new(0.1).check(TileId(0), &l).is_ok());
    }

    #[test]
    fn test_texture_paint_normalizes() {
        let mut l = layers();
        dab(&mut PaintTextureTool::new(1), &mut l, 0.5, false);
        let w: Vec<f32> = l.alphamaps.iter().map(|a| a.get(8, 8).unwrap()).collect();
        assert!((w[1] - 0.5).abs() < 1e-5);
        assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        // Outside the footprint nothing moved
        assert_eq!(l.alphamaps[0].get(0, 0), Some(1.0));
    }

    #[test]
    fn test_missing_layers_are_errors() {
        let mut l = layers();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = StrokeContext { opacity: 1.0, invert: false, rng: &mut rng };
        let fp = compute_footprint(16, 16, Vec2::splat(0.5), 4.0);
        let kernel = BrushKernel::uniform(4);

        let err = PaintTextureTool::new(7).apply(TileId(3), &mut l, &fp, &kernel, &mut ctx);
        assert!(matches!(err, Err(PaintError::LayerOutOfRange { index: 7, count: 3, .. })));

        let err = PaintDetailsTool::new(2, 16).apply(TileId(3), &mut l, &fp, &kernel, &mut ctx);
        assert!(matches!(err, Err(PaintError::LayerOutOfRange { kind: "detail", .. })));
    }

    #[test]
    fn test_details_full_opacity_hits_target() {
        let mut l = layers();
        let mut tool = PaintDetailsTool::new(0, 16);
        dab(&mut tool, &mut l, 1.0, false);
        assert_eq!(l.details[0].get(8, 8), Some(16));
        dab(&mut tool, &mut l, 1.0, true);
        assert_eq!(l.details[0].get(8, 8), Some(0));
    }

    #[test]
    fn test_holes_cut_and_fill() {
        let mut l = layers();
        let mut tool = PaintHolesTool::new(0.5);
        dab(&mut tool, &mut l, 1.0, false);
        assert_eq!(l.holes.get(8, 8), Some(true));
        dab(&mut tool, &mut l, 0.2, true);
        assert_eq!(l.holes.get(8, 8), Some(true));
        dab(&mut tool, &mut l, 1.0, true);
        assert_eq!(l.holes.get(8, 8), Some(false));
    }

    #[test]
    fn test_raster_targets() {
        let l = layers();
        assert_eq!(RasterTarget::Height.resolution(&l), Some((16, 16)));
        assert_eq!(RasterTarget::Detail.resolution(&l), Some((16, 16)));
        let bare = TileLayers::with_resolution(8);
        assert_eq!(RasterTarget::Detail.resolution(&bare), None);
        assert_eq!(RasterTarget::Alpha.resolution(&bare), Some((8, 8)));
    }
}
