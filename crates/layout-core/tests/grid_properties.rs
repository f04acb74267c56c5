use std::collections::HashSet;

use proptest::prelude::*;
use tilesync_clip_model::{ClipId, LayoutPattern, TileCell};
use tilesync_layout_core::grid::{assign_tiles, GridLayoutAssigner};

fn pattern_strategy() -> impl Strategy<Value = LayoutPattern> {
    prop_oneof![Just(LayoutPattern::RowMajor), Just(LayoutPattern::Serpentine)]
}

proptest! {
    #[test]
    fn assignment_is_a_bijection(n in 0usize..64, k in 1usize..12, pattern in pattern_strategy()) {
        let clips: Vec<ClipId> = (0..n).map(ClipId).collect();
        let tiles = assign_tiles(&clips, k, pattern).unwrap();

        prop_assert_eq!(tiles.rows, n.div_ceil(k));
        prop_assert_eq!(tiles.columns, k);
        prop_assert_eq!(tiles.len(), n);

        let distinct: HashSet<TileCell> = tiles.cells.values().copied().collect();
        prop_assert_eq!(distinct.len(), n);
        for cell in tiles.cells.values() {
            prop_assert!(cell.row < tiles.rows);
            prop_assert!(cell.column < k);
        }

        // Every cell is either assigned or reported as a filler slot.
        prop_assert_eq!(tiles.len() + tiles.unassigned_cells().len(), tiles.capacity());
    }

    #[test]
    fn assignment_is_deterministic(n in 0usize..40, k in 1usize..8, pattern in pattern_strategy()) {
        let clips: Vec<ClipId> = (0..n).map(ClipId).collect();
        let first = assign_tiles(&clips, k, pattern).unwrap();
        let second = assign_tiles(&clips, k, pattern).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn fillers_only_in_last_row(n in 1usize..40, k in 1usize..8, pattern in pattern_strategy()) {
        let clips: Vec<ClipId> = (0..n).map(ClipId).collect();
        let tiles = assign_tiles(&clips, k, pattern).unwrap();
        let fillers = tiles.unassigned_cells();

        prop_assert_eq!(fillers.len(), tiles.rows * k - n);
        for cell in fillers {
            prop_assert_eq!(cell.row, tiles.rows - 1);
        }
    }

    #[test]
    fn serpentine_keeps_consecutive_clips_adjacent(n in 2usize..40, k in 1usize..8) {
        let assigner = GridLayoutAssigner::new(k, LayoutPattern::Serpentine).unwrap();
        for i in 1..n {
            let a = assigner.cell_for(i - 1);
            let b = assigner.cell_for(i);
            let distance = a.row.abs_diff(b.row) + a.column.abs_diff(b.column);
            prop_assert_eq!(distance, 1);
        }
    }
}

#[test]
fn serpentine_reverses_only_odd_rows() {
    let clips: Vec<ClipId> = (0..9).map(ClipId).collect();
    let tiles = assign_tiles(&clips, 3, LayoutPattern::Serpentine).unwrap();
    let grid = tiles.grid();

    assert_eq!(grid[0], vec![Some(ClipId(0)), Some(ClipId(1)), Some(ClipId(2))]);
    assert_eq!(grid[1], vec![Some(ClipId(5)), Some(ClipId(4)), Some(ClipId(3))]);
    assert_eq!(grid[2], vec![Some(ClipId(6)), Some(ClipId(7)), Some(ClipId(8))]);
}
