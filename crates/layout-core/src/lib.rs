//! TileSync Layout Core
//!
//! Pure layout algorithms that turn an ordered clip list into grid cells:
//! - **Grid:** Row-major and serpentine tile assignment
//! - **Presets:** `RxC` grid presets mapped to tiles-per-row

pub mod grid;
pub mod preset;

pub use grid::*;
pub use preset::*;
