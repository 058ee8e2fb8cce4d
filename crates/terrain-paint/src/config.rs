//! # Paint Configuration
//!
//! Parses `paint.toml`, the brush and tool defaults for terrain painting.
//! Every section and field is optional; missing values fall back to the
//! defaults below.
//!
//! ## Table of Contents
//! 1. PaintConfig - Top-level config
//! 2. Section configs (brush, height, detail, holes)
//! 3. Parsing

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

// ============================================================================
// 1. PaintConfig - Top-level config
// ============================================================================

/// Configuration for terrain paint tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource, Default)]
pub struct PaintConfig {
    /// Brush defaults shared by every tool
    #[serde(default)]
    pub brush: BrushConfig,
    /// Height sculpting tools
    #[serde(default)]
    pub height: HeightConfig,
    /// Detail (scatter) density painting
    #[serde(default)]
    pub detail: DetailConfig,
    /// Hole painting
    #[serde(default)]
    pub holes: HolesConfig,
}

// ============================================================================
// 2. Section configs
// ============================================================================

/// Brush defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushConfig {
    /// Brush diameter in world units
    #[serde(default = "default_brush_size")]
    pub size: f32,
    /// Brush opacity (0-1)
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Hardness of the default falloff mask (0 = soft, 1 = hard disc)
    #[serde(default = "default_hardness")]
    pub hardness: f32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            size: default_brush_size(),
            opacity: default_opacity(),
            hardness: default_hardness(),
        }
    }
}

/// Height tool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightConfig {
    /// Normalized height added per dab by raise/lower at full strength
    #[serde(default = "default_height_delta")]
    pub delta: f32,
    /// Target height for set-height/flatten (normalized 0-1)
    #[serde(default)]
    pub target_height: f32,
    /// Smooth direction in [-1, 1]; +1 only lowers peaks, -1 only fills valleys
    #[serde(default)]
    pub smooth_direction: f32,
    /// Box blur radius in cells for the smooth tool
    #[serde(default = "default_blur_radius")]
    pub blur_radius: u32,
}

impl Default for HeightConfig {
    fn default() -> Self {
        Self {
            delta: default_height_delta(),
            target_height: 0.0,
            smooth_direction: 0.0,
            blur_radius: default_blur_radius(),
        }
    }
}

/// Detail density settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailConfig {
    /// Instance count the brush converges toward
    #[serde(default = "default_target_density")]
    pub target_density: u8,
    /// Hard cap for a cell's instance count
    #[serde(default = "default_max_density")]
    pub max_density: u8,
    /// Seed for stochastic rounding
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self {
            target_density: default_target_density(),
            max_density: default_max_density(),
            seed: default_seed(),
        }
    }
}

/// Hole painting settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolesConfig {
    /// Effective strength above which a cell's hole bit is written
    #[serde(default = "default_hole_threshold")]
    pub threshold: f32,
}

impl Default for HolesConfig {
    fn default() -> Self {
        Self { threshold: default_hole_threshold() }
    }
}

fn default_brush_size() -> f32 { 25.0 }
fn default_opacity() -> f32 { 0.5 }
fn default_hardness() -> f32 { 0.5 }
fn default_height_delta() -> f32 { 0.01 }
fn default_blur_radius() -> u32 { 1 }
fn default_target_density() -> u8 { 16 }
fn default_max_density() -> u8 { 255 }
fn default_seed() -> u64 { 42 }
fn default_hole_threshold() -> f32 { 0.5 }

// ============================================================================
// 3. Parsing
// ============================================================================

impl PaintConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config from a `paint.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded paint config from {}", path.display());
        Ok(config)
    }

    /// Preset for fine detail work: small soft brush, low opacity
    pub fn fine_detail() -> Self {
        Self {
            brush: BrushConfig {
                size: 5.0,
                opacity: 0.2,
                hardness: 0.1,
            },
            height: HeightConfig {
                delta: 0.002,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Preset for large area sculpting
    pub fn large_sculpt() -> Self {
        Self {
            brush: BrushConfig {
                size: 120.0,
                opacity: 0.8,
                hardness: 0.3,
            },
            height: HeightConfig {
                delta: 0.05,
                blur_radius: 3,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
