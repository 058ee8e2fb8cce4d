//! # Blend Functions
//!
//! Per-tool rules combining an existing raster value, a target value and the
//! effective brush strength (`opacity * kernel strength`) into a new value.

use crate::tile::Raster;

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// ============================================================================
// Height
// ============================================================================

/// Additive nudge: `sign` is +1 to raise, -1 to lower
#[inline]
pub fn raise_lower(existing: f32, delta: f32, sign: f32, opacity: f32, strength: f32) -> f32 {
    lerp(existing, existing + sign * delta, opacity * strength)
}

/// Pull toward a fixed target height
#[inline]
pub fn set_height(existing: f32, target: f32, opacity: f32, strength: f32) -> f32 {
    lerp(existing, target, opacity * strength)
}

/// Weights of (blurred, min(blurred, h), max(blurred, h)) for the smooth tool
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothWeights {
    pub centered: f32,
    pub down: f32,
    pub up: f32,
}

impl SmoothWeights {
    /// `direction` +1 only lowers peaks, -1 only fills valleys, 0 is symmetric
    pub fn from_direction(direction: f32) -> Self {
        Self {
            centered: (1.0 - direction.abs()).clamp(0.0, 1.0),
            down: direction.clamp(0.0, 1.0),
            up: (-direction).clamp(0.0, 1.0),
        }
    }
}

/// Mean of the `(2r+1)²` box around (x, y), clamped to the raster edge
pub fn box_blur(source: &Raster<f32>, x: u32, y: u32, radius: u32) -> f32 {
    let r = radius as i64;
    let (cx, cy) = (x as i64, y as i64);
    let mut sum = 0.0;
    for dy in -r..=r {
        for dx in -r..=r {
            sum += source.get_clamped(cx + dx, cy + dy);
        }
    }
    let n = (2 * r + 1) * (2 * r + 1);
    sum / n as f32
}

/// Blend a cell toward its blurred neighbourhood
pub fn smooth(
    source: &Raster<f32>,
    x: u32,
    y: u32,
    radius: u32,
    weights: SmoothWeights,
    strength: f32,
) -> f32 {
    let Some(h) = source.get(x, y) else { return 0.0 };
    let blurred = box_blur(source, x, y, radius);
    let target = weights.centered * blurred
        + weights.down * blurred.min(h)
        + weights.up * blurred.max(h);
    lerp(h, target, strength)
}

// ============================================================================
// Texture splats
// ============================================================================

/// Raise `weights[layer]` toward `target` and rescale the other layers so the
/// cell stays normalized to 1. Layers are only ever painted up; lowering one
/// layer means painting another.
pub fn paint_splat(weights: &mut [f32], layer: usize, target: f32, t: f32) {
    let count = weights.len();
    if layer >= count {
        return;
    }
    if count == 1 {
        weights[0] = 1.0;
        return;
    }

    let painted = lerp(weights[layer], target, t).clamp(0.0, 1.0);
    weights[layer] = painted;

    let remaining = 1.0 - painted;
    let others: f32 = weights
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != layer)
        .map(|(_, w)| *w)
        .sum();

    if others >= 0.01 {
        let scale = remaining / others;
        for (i, w) in weights.iter_mut().enumerate() {
            if i != layer {
                *w *= scale;
            }
        }
    } else {
        let share = remaining / (count - 1) as f32;
        for (i, w) in weights.iter_mut().enumerate() {
            if i != layer {
                *w = share;
            }
        }
    }
}

// ============================================================================
// Detail density
// ============================================================================

/// Stochastically rounded step toward `target` (negative targets erase).
/// `u` is uniform in [0, 1); fractional progress survives many weak dabs.
#[inline]
pub fn detail_density(existing: u8, target: f32, t: f32, u: f32, max: u8) -> u8 {
    let value = lerp(existing as f32, target, t) - 0.5 + u;
    value.round().clamp(0.0, max as f32) as u8
}

// ============================================================================
// Holes
// ============================================================================

/// Threshold write: above `threshold` the cell becomes a hole when `sign > 0`
/// and solid otherwise
#[inline]
pub fn hole(existing: bool, sign: f32, t: f32, threshold: f32) -> bool {
    if t > threshold {
        sign > 0.0
    } else {
        existing
    }
}
