//! TileSync Render Engine
//!
//! Turns the loaded clips into a single grid video. The layout comes from
//! the session's tile assignment; the composition is an ffmpeg filter
//! graph run by a cancellable background transcoder.
//!
//! # Pipeline Architecture
//!
//! ```text
//! clip 0 ── scale ── format ──┐ (pad to row height)
//! clip 1 ── scale ── format ──┴── hstack (row 0) ──┐
//!                                                  ├── vstack ── pad (margin) ── [vout]
//! clip 2 ── scale ── format ──┐                    │                               │
//! filler ── color ── format ──┴── hstack (row 1) ──┘                               ▼
//!                                                     ffmpeg (libx264, scratch dir) ──► output.mp4
//! ```

pub mod export;
pub mod graph;
pub mod progress;
pub mod transcode;

pub use export::*;
pub use graph::*;
pub use progress::*;
pub use transcode::*;
