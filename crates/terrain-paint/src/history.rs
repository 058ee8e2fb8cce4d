//! # Terrain Undo/Redo History
//!
//! Snapshot-based undo/redo for paint strokes. A stroke records each tile's
//! committed layers once, before the first edit to that tile; the records of
//! one stroke form a single history entry.
//!
//! ## Usage
//! ```rust,ignore
//! // Stroke machinery calls this before a tile is first modified
//! history.record(tile_id, tile.layers(), "Raise terrain");
//! history.commit_group();
//!
//! history.undo(&mut tiles);
//! history.redo(&mut tiles);
//! ```

use std::collections::VecDeque;

use bevy::prelude::Resource;

use crate::tile::{TileId, TileLayers, TileSet};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of undo entries to keep
const MAX_UNDO_STATES: usize = 50;

// ============================================================================
// Undo Sink
// ============================================================================

/// Receives a tile's committed layers before the tile is first modified
pub trait UndoSink {
    fn record(&mut self, tile: TileId, layers: &TileLayers, description: &str);
}

// ============================================================================
// Snapshot Types
// ============================================================================

/// Layers of one tile at a point in time
#[derive(Clone, Debug)]
pub struct TileSnapshot {
    pub tile: TileId,
    pub layers: TileLayers,
}

/// All tiles touched by one stroke
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    /// Description of the edit that created this entry
    pub description: String,
    pub snapshots: Vec<TileSnapshot>,
}

impl HistoryEntry {
    /// Estimate memory usage of this entry in bytes
    pub fn memory_size(&self) -> usize {
        self.snapshots
            .iter()
            .map(|s| s.layers.memory_size())
            .sum::<usize>()
            + self.description.len()
            + 64
    }

    /// Exchange snapshot contents with the live tiles. Applying the same
    /// entry twice restores the original state.
    fn swap_into(&mut self, tiles: &mut TileSet, reverse: bool) {
        let mut apply = |snapshot: &mut TileSnapshot| {
            if let Some(tile) = tiles.get_mut(snapshot.tile) {
                tile.swap_layers(&mut snapshot.layers);
            }
        };
        if reverse {
            self.snapshots.iter_mut().rev().for_each(&mut apply);
        } else {
            self.snapshots.iter_mut().for_each(&mut apply);
        }
    }
}

// ============================================================================
// History Resource
// ============================================================================

/// Terrain edit history for undo/redo operations
#[derive(Resource)]
pub struct TerrainHistory {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Records of the stroke in progress
    pending: Option<HistoryEntry>,

    /// Whether history is enabled
    pub enabled: bool,

    /// Maximum memory usage for history (in bytes)
    pub max_memory: usize,
}

impl Default for TerrainHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoSink for TerrainHistory {
    fn record(&mut self, tile: TileId, layers: &TileLayers, description: &str) {
        if !self.enabled {
            return;
        }
        self.redo_stack.clear();
        self.pending
            .get_or_insert_with(|| HistoryEntry {
                description: description.to_string(),
                snapshots: Vec::new(),
            })
            .snapshots
            .push(TileSnapshot {
                tile,
                layers: layers.clone(),
            });
    }
}

impl TerrainHistory {
    /// Create a new history with default settings
    pub fn new() -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(MAX_UNDO_STATES),
            redo_stack: Vec::with_capacity(MAX_UNDO_STATES / 2),
            pending: None,
            enabled: true,
            max_memory: 256 * 1024 * 1024, // 256 MB default
        }
    }

    /// Close the stroke in progress into one undo entry
    pub fn commit_group(&mut self) {
        let Some(entry) = self.pending.take() else { return };
        tracing::debug!(
            "History: '{}' ({} tiles)",
            entry.description,
            entry.snapshots.len()
        );
        self.undo_stack.push_back(entry);

        while self.undo_stack.len() > MAX_UNDO_STATES {
            self.undo_stack.pop_front();
        }
        self.trim_by_memory();
    }

    /// Undo the last stroke. Returns its description.
    pub fn undo(&mut self, tiles: &mut TileSet) -> Option<String> {
        self.commit_group();
        let mut entry = self.undo_stack.pop_back()?;
        entry.swap_into(tiles, true);
        let description = entry.description.clone();
        self.redo_stack.push(entry);
        Some(description)
    }

    /// Redo a previously undone stroke. Returns its description.
    pub fn redo(&mut self, tiles: &mut TileSet) -> Option<String> {
        let mut entry = self.redo_stack.pop()?;
        entry.swap_into(tiles, false);
        let description = entry.description.clone();
        self.undo_stack.push_back(entry);
        Some(description)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.pending.is_some()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get number of committed undo entries
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get number of redo entries
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Get description of next undo action
    pub fn undo_description(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .or(self.undo_stack.back())
            .map(|e| e.description.as_str())
    }

    /// Get description of next redo action
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|e| e.description.as_str())
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.pending = None;
    }

    /// Get total memory usage of history
    pub fn memory_usage(&self) -> usize {
        let undo_size: usize = self.undo_stack.iter().map(HistoryEntry::memory_size).sum();
        let redo_size: usize = self.redo_stack.iter().map(HistoryEntry::memory_size).sum();
        let pending_size = self.pending.as_ref().map(HistoryEntry::memory_size).unwrap_or(0);
        undo_size + redo_size + pending_size
    }

    /// Trim history to stay within memory budget
    fn trim_by_memory(&mut self) {
        while self.memory_usage() > self.max_memory && !self.undo_stack.is_empty() {
            self.undo_stack.pop_front();
        }
    }
}

// ============================================================================
// Edit Operation Types
// ============================================================================

/// Types of terrain edit operations (for history descriptions)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerrainEditOp {
    Raise,
    Lower,
    SetHeight,
    Smooth,
    PaintTexture,
    PaintDetails,
    PaintHoles,
}

impl TerrainEditOp {
    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Raise => "Raise terrain",
            Self::Lower => "Lower terrain",
            Self::SetHeight => "Set terrain height",
            Self::Smooth => "Smooth terrain",
            Self::PaintTexture => "Paint texture",
            Self::PaintDetails => "Paint details",
            Self::PaintHoles => "Paint holes",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
