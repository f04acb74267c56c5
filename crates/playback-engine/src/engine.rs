//! Playback engine contracts.
//!
//! A backend opens one engine per clip. Engines accept transport commands
//! synchronously and report everything else (duration, geometry, position,
//! state changes) as [`PlaybackEvent`]s through the sender they were
//! opened with.

use std::path::Path;

use tilesync_clip_model::{ClipId, PlaybackEvent};
use tilesync_common::error::TileSyncResult;

/// Sending half of the session's event queue, cloned into every engine.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<PlaybackEvent>;

/// Trait for a single clip's media player.
///
/// Implementations wrap a real multimedia backend (GStreamer, a headless
/// simulated clock, a scripted test double).
pub trait PlaybackEngine: Send {
    /// Start or resume playback.
    fn play(&mut self) -> TileSyncResult<()>;

    /// Pause playback, keeping the current position.
    fn pause(&mut self) -> TileSyncResult<()>;

    /// Stop playback and return to the start.
    fn stop(&mut self) -> TileSyncResult<()>;

    /// Seek to an absolute position in milliseconds.
    fn seek(&mut self, position_ms: u64) -> TileSyncResult<()>;

    /// Set output volume in `[0.0, 1.0]`.
    fn set_volume(&mut self, volume: f64) -> TileSyncResult<()>;

    /// Mute or unmute audio output.
    fn set_muted(&mut self, muted: bool) -> TileSyncResult<()>;

    /// Engine name for logging.
    fn name(&self) -> &str;
}

/// Factory that opens playback engines for locators.
pub trait PlaybackBackend: Send {
    /// Open `locator` for `clip`. Fails with `InvalidSource` when the
    /// backend cannot play it. Metadata is reported later through `events`.
    fn open(
        &self,
        clip: ClipId,
        locator: &Path,
        events: EventSender,
    ) -> TileSyncResult<Box<dyn PlaybackEngine>>;

    /// Check if this backend is usable on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Forward an event to the owner, ignoring a closed queue (the session is
/// shutting down and nobody is listening any more).
pub(crate) fn emit(events: &EventSender, event: PlaybackEvent) {
    if events.send(event).is_err() {
        tracing::trace!("Event queue closed; dropping playback event");
    }
}
