//! TileSync Clip Model
//!
//! Defines the core data contracts shared by playback, layout, and export:
//! - **Clips:** Loaded sources with probed duration and aspect ratio
//! - **Transport:** Session transport state and layout pattern selection
//! - **Events:** Asynchronous notifications from per-clip playback engines
//! - **Tiles:** Grid cell assignments produced by the layout assigner
//!
//! All positions and durations are integer milliseconds.

pub mod clip;
pub mod event;
pub mod tile;
pub mod transport;

pub use clip::*;
pub use event::*;
pub use tile::*;
pub use transport::*;
