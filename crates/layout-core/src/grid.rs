//! Grid tile assignment.
//!
//! Clips are placed in their registry order. With `k` tiles per row,
//! clip `i` lands on row `i / k`. Row-major keeps every row left to
//! right; serpentine flips odd rows so consecutive clips stay adjacent
//! when the grid is read boustrophedon-style.

use std::collections::BTreeMap;

use tilesync_clip_model::{ClipId, LayoutPattern, TileAssignment, TileCell};
use tilesync_common::error::{TileSyncError, TileSyncResult};

/// Assigns ordered clips to grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayoutAssigner {
    tiles_per_row: usize,
    pattern: LayoutPattern,
}

impl GridLayoutAssigner {
    /// Fails with `OutOfRange` when `tiles_per_row` is zero.
    pub fn new(tiles_per_row: usize, pattern: LayoutPattern) -> TileSyncResult<Self> {
        if tiles_per_row == 0 {
            return Err(TileSyncError::out_of_range(
                "tiles per row must be at least 1",
            ));
        }
        Ok(Self {
            tiles_per_row,
            pattern,
        })
    }

    pub fn tiles_per_row(&self) -> usize {
        self.tiles_per_row
    }

    pub fn pattern(&self) -> LayoutPattern {
        self.pattern
    }

    /// Same tiles per row with a different pattern.
    pub fn with_pattern(self, pattern: LayoutPattern) -> Self {
        Self { pattern, ..self }
    }

    /// Number of rows needed for `clip_count` clips.
    pub fn rows_for(&self, clip_count: usize) -> usize {
        clip_count.div_ceil(self.tiles_per_row)
    }

    /// Cell for the clip at position `index` in the ordered list.
    pub fn cell_for(&self, index: usize) -> TileCell {
        let k = self.tiles_per_row;
        let row = index / k;
        let offset = index % k;
        let column = match self.pattern {
            LayoutPattern::RowMajor => offset,
            LayoutPattern::Serpentine if row % 2 == 1 => k - 1 - offset,
            LayoutPattern::Serpentine => offset,
        };
        TileCell::new(row, column)
    }

    /// Assign every clip, in order, to a cell.
    pub fn assign(&self, clips: &[ClipId]) -> TileAssignment {
        let cells: BTreeMap<ClipId, TileCell> = clips
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, self.cell_for(index)))
            .collect();

        let assignment = TileAssignment {
            rows: self.rows_for(clips.len()),
            columns: self.tiles_per_row,
            cells,
        };

        tracing::debug!(
            clips = clips.len(),
            rows = assignment.rows,
            columns = assignment.columns,
            pattern = %self.pattern,
            "Tile assignment computed"
        );

        assignment
    }
}

/// Convenience wrapper: validate `tiles_per_row` and assign in one call.
pub fn assign_tiles(
    clips: &[ClipId],
    tiles_per_row: usize,
    pattern: LayoutPattern,
) -> TileSyncResult<TileAssignment> {
    Ok(GridLayoutAssigner::new(tiles_per_row, pattern)?.assign(clips))
}
