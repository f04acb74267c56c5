//! Playback backends.
//!
//! - [`HeadlessBackend`]: probes files with `ffprobe` and runs a simulated
//!   transport clock. Used for planning and export where nothing is shown.
//! - [`ScriptedBackend`]: in-memory media with preset metadata that records
//!   every engine command.
//! - `GstBackend` (feature `gstreamer`): one `playbin` per clip.

pub mod headless;
pub mod scripted;

#[cfg(feature = "gstreamer")]
pub mod gst;

pub use headless::HeadlessBackend;
pub use scripted::{EngineCommand, ScriptedBackend, ScriptedMedia};

#[cfg(feature = "gstreamer")]
pub use self::gst::GstBackend;

use crate::engine::PlaybackBackend;

/// Pick the best available backend for interactive playback.
///
/// GStreamer when compiled in and initializable, headless otherwise.
pub fn default_backend() -> Box<dyn PlaybackBackend> {
    #[cfg(feature = "gstreamer")]
    {
        let gst = GstBackend::new();
        if gst.is_available() {
            return Box::new(gst);
        }
        tracing::warn!("GStreamer unavailable, falling back to headless playback");
    }
    Box::new(HeadlessBackend::new())
}
