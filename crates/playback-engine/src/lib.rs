//! TileSync Playback Engine
//!
//! Owns the loaded clips and keeps them on one master timeline. Every clip
//! is driven by its own [`PlaybackEngine`]; engines report metadata and
//! position asynchronously through an event queue that the
//! [`SyncController`] drains on its owning task.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 SyncController                   │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │ Session (transport, volume, master time)   │  │
//! │  │  ┌──────────────────────────────────────┐  │  │
//! │  │  │ ClipRegistry                         │  │  │
//! │  │  │  clip 0 ─ engine   clip 1 ─ engine … │  │  │
//! │  │  └──────────────────┬───────────────────┘  │  │
//! │  └─────────────────────┼──────────────────────┘  │
//! │        commands ▼      │       ▲ PlaybackEvent   │
//! │                        └── EventQueue (mpsc) ────┘
//! └──────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod engine;
pub mod events;
pub mod probe;
pub mod registry;
pub mod session;
pub mod sync;

pub use engine::*;
pub use events::*;
pub use registry::*;
pub use session::*;
pub use sync::*;
