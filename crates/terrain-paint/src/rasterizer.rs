//! # Brush Rasterizer
//!
//! Intersects a brush with one tile raster and blends new cell values.
//!
//! `compute_footprint` turns a stroke centre (tile UV) and a brush diameter
//! (raster cells) into a clamped rectangle; `rasterize` walks it, samples the
//! kernel for each cell and hands the cell to a blend function.

use bevy::math::{IVec2, Vec2};

use crate::kernel::BrushKernel;
use crate::tile::Raster;

// ============================================================================
// Footprint
// ============================================================================

/// Region of a raster touched by one brush dab
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrushFootprint {
    /// Inclusive minimum cell (clamped to the raster)
    pub min: IVec2,
    /// Exclusive maximum cell (clamped to the raster)
    pub max: IVec2,
    /// Raster cell that maps to kernel cell (0, 0)
    pub origin: IVec2,
    /// Kernel size the footprint was computed for (rounded diameter)
    pub kernel_size: u32,
}

/// One cell of a footprint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FootprintCell {
    pub x: u32,
    pub y: u32,
    /// Kernel-space offset of this cell
    pub brush: IVec2,
}

impl BrushFootprint {
    /// Footprint that touches nothing
    pub const EMPTY: BrushFootprint = BrushFootprint {
        min: IVec2::ZERO,
        max: IVec2::ZERO,
        origin: IVec2::ZERO,
        kernel_size: 0,
    };

    pub fn width(&self) -> u32 {
        (self.max.x - self.min.x).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max.y - self.min.y).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Number of cells covered
    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = FootprintCell> + '_ {
        let (min, max, origin) = (self.min, self.max, self.origin);
        (min.y..max.y).flat_map(move |y| {
            (min.x..max.x).map(move |x| FootprintCell {
                x: x as u32,
                y: y as u32,
                brush: IVec2::new(x, y) - origin,
            })
        })
    }
}

/// Footprint of a brush of `diameter` raster cells centred at `center_uv`
/// on a `raster_width × raster_height` raster.
///
/// Returns `BrushFootprint::EMPTY` when the brush lies entirely off the raster.
pub fn compute_footprint(
    raster_width: u32,
    raster_height: u32,
    center_uv: Vec2,
    diameter: f32,
) -> BrushFootprint {
    let w = raster_width as i32;
    let h = raster_height as i32;
    if w == 0 || h == 0 {
        return BrushFootprint::EMPTY;
    }

    let size = diameter.round().max(0.0) as i32;
    let radius = size / 2;
    let fraction = size % 2;

    let center = IVec2::new(
        (center_uv.x * w as f32).floor() as i32,
        (center_uv.y * h as f32).floor() as i32,
    );
    let min = center - IVec2::splat(radius);
    let max = center + IVec2::splat(radius + fraction);

    if min.x >= w || min.y >= h || max.x <= 0 || max.y <= 0 {
        return BrushFootprint::EMPTY;
    }

    BrushFootprint {
        min: IVec2::new(min.x.clamp(0, w - 1), min.y.clamp(0, h - 1)),
        max: IVec2::new(max.x.clamp(0, w), max.y.clamp(0, h)),
        origin: min,
        kernel_size: size as u32,
    }
}

// ============================================================================
// Rasterization
// ============================================================================

/// What a blend function sees for one cell
pub struct CellSample<'a, T> {
    /// Unmodified source layer (for neighbourhood reads such as blurs)
    pub source: &'a Raster<T>,
    pub x: u32,
    pub y: u32,
    /// Source value at (x, y)
    pub existing: T,
    /// Kernel strength at this cell
    pub strength: f32,
}

/// Blend every footprint cell of `source` into `dest`.
/// Returns the number of cells written.
pub fn rasterize<T, F>(
    footprint: &BrushFootprint,
    kernel: &BrushKernel,
    source: &Raster<T>,
    dest: &mut Raster<T>,
    mut blend: F,
) -> usize
where
    T: Copy,
    F: FnMut(CellSample<'_, T>) -> T,
{
    let mut written = 0;
    for cell in footprint.cells() {
        let Some(existing) = source.get(cell.x, cell.y) else { continue };
        let strength = kernel.sample(cell.brush.x, cell.brush.y);
        let value = blend(CellSample {
            source,
            x: cell.x,
            y: cell.y,
            existing,
            strength,
        });
        if dest.set(cell.x, cell.y, value) {
            written += 1;
        }
    }
    written
}

/// Single-buffer variant for point-wise blends: `blend(existing, strength)`
pub fn rasterize_in_place<T, F>(
    footprint: &BrushFootprint,
    kernel: &BrushKernel,
    layer: &mut Raster<T>,
    mut blend: F,
) -> usize
where
    T: Copy,
    F: FnMut(T, f32) -> T,
{
    let mut written = 0;
    for cell in footprint.cells() {
        let Some(existing) = layer.get(cell.x, cell.y) else { continue };
        let strength = kernel.sample(cell.brush.x, cell.brush.y);
        layer.set(cell.x, cell.y, blend(existing, strength));
        written += 1;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_and_odd_sizes() {
        let even = compute_footprint(64, 64, Vec2::splat(0.5), 4.0);
        assert_eq!((even.min, even.max), (IVec2::splat(30), IVec2::splat(34)));
        assert_eq!(even.kernel_size, 4);

        let odd = compute_footprint(64, 64, Vec2::splat(0.5), 5.0);
        assert_eq!((odd.min, odd.max), (IVec2::splat(30), IVec2::splat(35)));
        assert_eq!(odd.width(), 5);

        // Kernel offsets cover 0..size for both parities
        let offsets: Vec<i32> = odd.cells().filter(|c| c.y == 30).map(|c| c.brush.x).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clamped_at_edges() {
        let fp = compute_footprint(32, 32, Vec2::new(0.0, 0.99), 10.0);
        assert_eq!(fp.min, IVec2::new(0, 26));
        assert_eq!(fp.max, IVec2::new(5, 32));
        assert_eq!(fp.origin, IVec2::new(-5, 26));
        // The first column maps into the middle of the kernel
        assert_eq!(fp.cells().next().map(|c| c.brush), Some(IVec2::new(5, 0)));
    }

    #[test]
    fn test_off_raster_is_empty() {
        for uv in [Vec2::new(1.5, 0.5), Vec2::new(-0.5, 0.5), Vec2::new(0.5, 2.0), Vec2::new(0.5, -1.0)] {
            let fp = compute_footprint(64, 64, uv, 10.0);
            assert!(fp.is_empty(), "{uv:?}");
            assert_eq!(fp.cells().count(), 0);
        }
        assert!(compute_footprint(0, 0, Vec2::splat(0.5), 10.0).is_empty());
        assert!(compute_footprint(64, 64, Vec2::splat(0.5), 0.0).is_empty());
    }

    #[test]
    fn test_brush_reaching_past_edge_is_not_empty() {
        // Centre just off the right edge, radius reaches back in
        let fp = compute_footprint(64, 64, Vec2::new(1.02, 0.5), 10.0);
        assert!(!fp.is_empty());
        assert_eq!(fp.max.x, 64);
    }

    #[test]
    fn test_empty_footprint_is_noop() {
        let kernel = BrushKernel::uniform(4);
        let source = Raster::new(8, 8, 1.0f32);
        let mut dest = source.clone();
        let touched = rasterize(&BrushFootprint::EMPTY, &kernel, &source, &mut dest, |c| c.existing + 1.0);
        assert_eq!(touched, 0);
        assert_eq!(dest, source);

        let off = compute_footprint(8, 8, Vec2::new(5.0, 5.0), 4.0);
        assert_eq!(rasterize_in_place(&off, &kernel, &mut dest, |v, _| v * 10.0), 0);
        assert_eq!(dest, source);
    }

    #[test]
    fn test_rasterize_touches_only_footprint() {
        let kernel = BrushKernel::uniform(2);
        let source = Raster::new(8, 8, 0u8);
        let mut dest = source.clone();
        let fp = compute_footprint(8, 8, Vec2::splat(0.5), 2.0);
        let touched = rasterize(&fp, &kernel, &source, &mut dest, |_| 9);

        assert_eq!(touched, 4);
        assert_eq!(dest.data().iter().filter(|&&v| v == 9).count(), 4);
        assert_eq!(dest.get(3, 3), Some(9));
        assert_eq!(dest.get(4, 4), Some(9));
        assert_eq!(dest.get(5, 5), Some(0));
    }
}
