//! # Brush Kernels
//!
//! A brush kernel is a square table of strengths in [0, 1] resampled from a
//! grayscale brush mask. Tools sample it once per raster cell, so lookups
//! clamp instead of failing.
//!
//! ## Mask sources
//! - **Samples**: raw grayscale values (e.g. from a host texture)
//! - **Falloff**: radial disc with smoothstep edge
//! - **Noise stamps**: procedural hills, ridges, craters, plateaus, dunes
//! - **Images**: red channel of a PNG/JPEG (feature `image-masks`)
//!
//! ## Usage
//! ```rust,ignore
//! let mask = BrushMask::falloff(64, 0.5);
//! let kernel = cache.get_or_build(Some(&mask), 25);
//! let strength = kernel.sample(12, 12);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use bevy::prelude::Resource;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin, RidgedMulti};

use crate::error::{PaintError, Result};

/// Kernels smaller than this are filled uniformly instead of resampled
pub const MIN_KERNEL_SIZE: u32 = 3;

// ============================================================================
// Brush Masks
// ============================================================================

/// Identity of a mask's contents, used as the kernel cache key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaskId(u64);

/// Grayscale brush mask (red/luminance channel only)
#[derive(Clone, Debug)]
pub struct BrushMask {
    width: u32,
    height: u32,
    samples: Vec<f32>,
    id: MaskId,
}

impl BrushMask {
    /// Wrap row-major grayscale samples
    pub fn from_samples(width: u32, height: u32, samples: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 || samples.len() != width as usize * height as usize {
            return Err(PaintError::RasterSizeMismatch {
                expected: (width, height),
                actual: (samples.len() as u32, 1),
            });
        }

        Ok(Self::from_grid(width, height, samples))
    }

    /// Radial disc: full strength inside `hardness`, smoothstep to zero at the rim
    pub fn falloff(size: u32, hardness: f32) -> Self {
        let size = size.max(1);
        let hardness = hardness.clamp(0.0, 1.0);
        let samples = radial_grid(size, |t| {
            if t >= 1.0 {
                0.0
            } else if t <= hardness {
                1.0
            } else {
                let s = (t - hardness) / (1.0 - hardness);
                1.0 - s * s * (3.0 - 2.0 * s)
            }
        });
        Self::from_grid(size, size, samples)
    }

    /// Procedural noise stamp, faded out toward the rim
    pub fn noise(pattern: NoisePattern, size: u32, seed: u32) -> Self {
        let size = size.max(1);
        let stamp = NoiseStamp::new(pattern, seed);
        let half = size as f32 * 0.5;
        let mut samples = Vec::with_capacity(size as usize * size as usize);
        for y in 0..size {
            for x in 0..size {
                let lx = (x as f32 + 0.5 - half) / half;
                let ly = (y as f32 + 0.5 - half) / half;
                samples.push(stamp.sample(lx, ly).clamp(0.0, 1.0));
            }
        }
        Self::from_grid(size, size, samples)
    }

    /// Load the red channel of an image file
    #[cfg(feature = "image-masks")]
    pub fn from_image(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| PaintError::MaskLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rgb = img.to_rgb32f();
        let (width, height) = rgb.dimensions();
        let samples = rgb.pixels().map(|p| p.0[0]).collect();
        Self::from_samples(width, height, samples)
    }

    /// Load the red channel of an image file
    #[cfg(not(feature = "image-masks"))]
    pub fn from_image(path: &Path) -> Result<Self> {
        Err(PaintError::MaskLoad {
            path: path.to_path_buf(),
            reason: "built without image-masks feature".to_string(),
        })
    }

    /// Load a mask image, or fall back to a uniform brush (`None`) with a warning
    pub fn load_or_uniform(path: &Path) -> Option<Self> {
        match Self::from_image(path) {
            Ok(mask) => Some(mask),
            Err(e) => {
                tracing::warn!("{}; painting with a uniform brush", e);
                None
            }
        }
    }

    /// Caller guarantees `samples.len() == width * height`
    fn from_grid(width: u32, height: u32, samples: Vec<f32>) -> Self {
        let mut hasher = DefaultHasher::new();
        width.hash(&mut hasher);
        height.hash(&mut hasher);
        for s in &samples {
            s.to_bits().hash(&mut hasher);
        }
        Self {
            width,
            height,
            samples,
            id: MaskId(hasher.finish()),
        }
    }

    pub fn id(&self) -> MaskId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bilinear sample at normalized coordinates, clamp-to-edge
    pub fn sample_bilinear(&self, u: f32, v: f32) -> f32 {
        let px = u * self.width as f32 - 0.5;
        let py = v * self.height as f32 - 0.5;
        let x0 = px.floor();
        let y0 = py.floor();
        let fx = px - x0;
        let fy = py - y0;

        let texel = |x: f32, y: f32| -> f32 {
            let cx = (x as i64).clamp(0, self.width as i64 - 1) as usize;
            let cy = (y as i64).clamp(0, self.height as i64 - 1) as usize;
            self.samples[cy * self.width as usize + cx]
        };

        let h00 = texel(x0, y0);
        let h10 = texel(x0 + 1.0, y0);
        let h01 = texel(x0, y0 + 1.0);
        let h11 = texel(x0 + 1.0, y0 + 1.0);

        let h0 = h00 + (h10 - h00) * fx;
        let h1 = h01 + (h11 - h01) * fx;
        h0 + (h1 - h0) * fy
    }
}

/// Evaluate `profile(t)` over a square grid, `t` = distance from the centre
/// normalized so the inscribed circle's rim is 1
fn radial_grid(size: u32, profile: impl Fn(f32) -> f32) -> Vec<f32> {
    let half = size as f32 * 0.5;
    let mut samples = Vec::with_capacity(size as usize * size as usize);
    for y in 0..size {
        for x in 0..size {
            let dx = (x as f32 + 0.5 - half) / half;
            let dy = (y as f32 + 0.5 - half) / half;
            samples.push(profile((dx * dx + dy * dy).sqrt()));
        }
    }
    samples
}

// ============================================================================
// Noise Stamps
// ============================================================================

/// Types of procedural stamp patterns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NoisePattern {
    /// Smooth hills using Perlin fBm
    #[default]
    PerlinHills,
    /// Sharp ridges using ridged multifractal
    Ridges,
    /// Bowl with a raised rim
    Crater,
    /// Flat top with steep sides
    Plateau,
    /// Wave-like dunes
    Dunes,
}

struct NoiseStamp {
    pattern: NoisePattern,
    fbm: Fbm<Perlin>,
    ridged: RidgedMulti<Perlin>,
}

impl NoiseStamp {
    fn new(pattern: NoisePattern, seed: u32) -> Self {
        Self {
            pattern,
            fbm: Fbm::<Perlin>::new(seed).set_octaves(4).set_frequency(2.0),
            ridged: RidgedMulti::<Perlin>::new(seed).set_octaves(5).set_frequency(1.5),
        }
    }

    /// Strength at local coordinates in [-1, 1]², zero outside the unit disc
    fn sample(&self, x: f32, y: f32) -> f32 {
        let t = (x * x + y * y).sqrt();
        if t > 1.0 {
            return 0.0;
        }
        let rim = 1.0 - t;

        match self.pattern {
            NoisePattern::PerlinHills => {
                (self.fbm.get([x as f64, y as f64]) as f32 * 0.5 + 0.5) * rim
            }
            NoisePattern::Ridges => {
                (self.ridged.get([x as f64, y as f64]) as f32 * 0.5 + 0.5) * rim
            }
            NoisePattern::Crater => {
                if t < 0.7 {
                    let inner = t / 0.7;
                    1.0 - inner * inner
                } else {
                    (1.0 - (t - 0.7) / 0.3) * 0.3
                }
            }
            NoisePattern::Plateau => {
                if t < 0.6 {
                    1.0
                } else {
                    let s = (t - 0.6) / 0.4;
                    1.0 - s * s
                }
            }
            NoisePattern::Dunes => {
                let wave1 = ((x * 3.0 + y * 1.5) * std::f32::consts::PI).sin();
                let wave2 = ((x * 2.1 - y * 0.9) * std::f32::consts::PI * 1.5).sin();
                ((wave1 * 0.6 + wave2 * 0.4) * 0.5 + 0.5) * rim
            }
        }
    }
}

// ============================================================================
// Brush Kernel
// ============================================================================

/// Square strength table derived from a brush mask
#[derive(Clone, Debug, PartialEq)]
pub struct BrushKernel {
    size: u32,
    strengths: Vec<f32>,
}

impl BrushKernel {
    /// Uniform full-strength kernel
    pub fn uniform(size: u32) -> Self {
        let size = size.max(1);
        Self {
            size,
            strengths: vec![1.0; size as usize * size as usize],
        }
    }

    /// Resample `mask` to `target_size × target_size`.
    ///
    /// No mask gives a 1×1 full-strength kernel; sizes below
    /// `MIN_KERNEL_SIZE` are filled with full strength.
    pub fn build(mask: Option<&BrushMask>, target_size: u32) -> Self {
        let Some(mask) = mask else {
            return Self::uniform(1);
        };
        if target_size < MIN_KERNEL_SIZE {
            return Self::uniform(target_size);
        }

        let inv = 1.0 / target_size as f32;
        let mut strengths = Vec::with_capacity(target_size as usize * target_size as usize);
        for y in 0..target_size {
            for x in 0..target_size {
                let u = (x as f32 + 0.5) * inv;
                let v = (y as f32 + 0.5) * inv;
                strengths.push(mask.sample_bilinear(u, v).clamp(0.0, 1.0));
            }
        }
        Self {
            size: target_size,
            strengths,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Strength at kernel cell (ix, iy), indices clamped to the kernel edge
    #[inline]
    pub fn sample(&self, ix: i32, iy: i32) -> f32 {
        let max = self.size as i32 - 1;
        let x = ix.clamp(0, max) as usize;
        let y = iy.clamp(0, max) as usize;
        self.strengths[y * self.size as usize + x]
    }
}

/// Last-built kernel, rebuilt only when the mask or size changes
#[derive(Resource, Default, Debug)]
pub struct KernelCache {
    entry: Option<((Option<MaskId>, u32), BrushKernel)>,
    rebuilds: u64,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kernel for `(mask, size)`, rebuilding if the key changed
    pub fn get_or_build(&mut self, mask: Option<&BrushMask>, size: u32) -> &BrushKernel {
        let key = (mask.map(BrushMask::id), size);
        if !matches!(&self.entry, Some((k, _)) if *k == key) {
            self.entry = None;
        }
        let rebuilds = &mut self.rebuilds;
        let (_, kernel) = self.entry.get_or_insert_with(|| {
            *rebuilds += 1;
            tracing::debug!("Rebuilding brush kernel: size={} mask={:?}", size, key.0);
            (key, BrushKernel::build(mask, size))
        });
        kernel
    }

    /// Force the next lookup to rebuild
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Number of kernel builds so far
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Size of the cached kernel, if one has been built
    pub fn size(&self) -> Option<u32> {
        self.entry.as_ref().map(|((_, size), _)| *size)
    }
}

// ============================================================================
// Tests
// ============================================================================
