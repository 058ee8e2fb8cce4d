//! # Paint Errors
//!
//! Error types for terrain painting. Structural problems (inconsistent grids,
//! off-raster brushes, out-of-range lookups) are not errors; they are reported
//! through flags or resolved to sentinels. Only resource-class failures end up
//! here, and callers are expected to log them and carry on.

use std::path::PathBuf;
use thiserror::Error;

use crate::tile::TileId;

/// Terrain paint error types.
#[derive(Error, Debug)]
pub enum PaintError {
    // ========================================================================
    // Resource Errors
    // ========================================================================

    #[error("Failed to load brush mask {path}: {reason}")]
    MaskLoad { path: PathBuf, reason: String },

    #[error("{kind} layer {index} out of range on tile {tile:?} ({count} layers)")]
    LayerOutOfRange {
        tile: TileId,
        kind: &'static str,
        index: usize,
        count: usize,
    },

    #[error("Raster size mismatch: expected {expected:?}, got {actual:?}")]
    RasterSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Unknown tile {0:?}")]
    UnknownTile(TileId),

    // ========================================================================
    // Configuration Errors
    // ========================================================================

    #[error("Invalid paint config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for terrain paint operations.
pub type Result<T> = std::result::Result<T, PaintError>;
