//! Grid tile assignments.
//!
//! A [`TileAssignment`] maps every loaded clip to exactly one grid cell.
//! Cells left over in the final row are not part of the map; they are
//! derived on demand and become filler tiles at export time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clip::ClipId;

/// A grid cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCell {
    pub row: usize,
    pub column: usize,
}

impl TileCell {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Mapping from clip to grid cell plus the grid dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileAssignment {
    /// Number of rows.
    pub rows: usize,

    /// Number of columns (tiles per row).
    pub columns: usize,

    /// Clip -> cell, one entry per clip.
    pub cells: BTreeMap<ClipId, TileCell>,
}

impl TileAssignment {
    /// Total number of grid cells (`rows * columns`).
    pub fn capacity(&self) -> usize {
        self.rows * self.columns
    }

    /// Number of assigned clips.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell a clip was assigned to.
    pub fn cell_of(&self, clip: ClipId) -> Option<TileCell> {
        self.cells.get(&clip).copied()
    }

    /// The clip occupying a cell, if any.
    pub fn clip_at(&self, cell: TileCell) -> Option<ClipId> {
        self.cells
            .iter()
            .find(|(_, c)| **c == cell)
            .map(|(id, _)| *id)
    }

    /// Cell grid indexed `[row][column]`; `None` marks an unassigned cell.
    pub fn grid(&self) -> Vec<Vec<Option<ClipId>>> {
        let mut grid = vec![vec![None; self.columns]; self.rows];
        for (id, cell) in &self.cells {
            if let Some(slot) = grid
                .get_mut(cell.row)
                .and_then(|row| row.get_mut(cell.column))
            {
                *slot = Some(*id);
            }
        }
        grid
    }

    /// Cells with no clip, in row-major order. Only the final row can
    /// have any.
    pub fn unassigned_cells(&self) -> Vec<TileCell> {
        self.grid()
            .into_iter()
            .enumerate()
            .flat_map(|(row, cells)| {
                cells
                    .into_iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_none())
                    .map(move |(column, _)| TileCell::new(row, column))
            })
            .collect()
    }
}
