//! TileSync Common Utilities
//!
//! Shared infrastructure for all TileSync crates:
//! - Error taxonomy and result aliases
//! - Media-time helpers (ms/secs conversion, HH:MM:SS labels, drift)
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
