//! `RxC` grid presets.
//!
//! Users pick layouts such as `2x2` or `3x3`. Only the column count drives
//! tile assignment; the row count gives the preset's nominal capacity,
//! which callers may use to warn when more clips are loaded than the
//! preset shows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tilesync_common::error::TileSyncError;

/// A grid preset of `rows x columns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: usize,
    pub columns: usize,
}

impl GridSpec {
    /// Presets offered by default.
    pub const PRESETS: [GridSpec; 5] = [
        GridSpec::new(1, 2),
        GridSpec::new(2, 1),
        GridSpec::new(2, 2),
        GridSpec::new(2, 3),
        GridSpec::new(3, 3),
    ];

    pub const fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    /// Tiles per row used for assignment.
    pub fn tiles_per_row(&self) -> usize {
        self.columns
    }

    /// Number of cells the preset shows.
    pub fn capacity(&self) -> usize {
        self.rows * self.columns
    }

    /// Smallest default preset that fits `clip_count` clips, if any.
    pub fn smallest_fitting(clip_count: usize) -> Option<GridSpec> {
        Self::PRESETS
            .iter()
            .copied()
            .filter(|spec| spec.capacity() >= clip_count)
            .min_by_key(|spec| (spec.capacity(), spec.rows))
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}

impl FromStr for GridSpec {
    type Err = TileSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TileSyncError::config(format!("invalid grid '{s}' (expected RxC, e.g. 2x3)"));
        let (rows, columns) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let rows: usize = rows.trim().parse().map_err(|_| invalid())?;
        let columns: usize = columns.trim().parse().map_err(|_| invalid())?;
        if rows == 0 || columns == 0 {
            return Err(invalid());
        }
        Ok(Self::new(rows, columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_presets() {
        let spec: GridSpec = "2x3".parse().unwrap();
        assert_eq!(spec, GridSpec::new(2, 3));
        assert_eq!(spec.tiles_per_row(), 3);
        assert_eq!(spec.capacity(), 6);
        assert_eq!(" 3X3 ".parse::<GridSpec>().unwrap(), GridSpec::new(3, 3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<GridSpec>().is_err());
        assert!("2by2".parse::<GridSpec>().is_err());
        assert!("0x2".parse::<GridSpec>().is_err());
        assert!("2x".parse::<GridSpec>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for spec in GridSpec::PRESETS {
            assert_eq!(spec.to_string().parse::<GridSpec>().unwrap(), spec);
        }
    }

    #[test]
    fn test_smallest_fitting() {
        assert_eq!(GridSpec::smallest_fitting(1), Some(GridSpec::new(1, 2)));
        assert_eq!(GridSpec::smallest_fitting(3), Some(GridSpec::new(2, 2)));
        assert_eq!(GridSpec::smallest_fitting(5), Some(GridSpec::new(2, 3)));
        assert_eq!(GridSpec::smallest_fitting(9), Some(GridSpec::new(3, 3)));
        assert_eq!(GridSpec::smallest_fitting(10), None);
    }
}
