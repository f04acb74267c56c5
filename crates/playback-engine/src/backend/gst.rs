//! GStreamer backend: one `playbin` per clip.
//!
//! A monitor thread per engine drains the playbin bus, reports duration and
//! video geometry once they are negotiated, and polls the position while
//! playing. Everything it learns goes to the session's event queue.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Instant;

use gst::prelude::*;
use gstreamer as gst;

use tilesync_clip_model::{ClipId, PlaybackEvent, PlaybackState};
use tilesync_common::clock::RateController;
use tilesync_common::error::{TileSyncError, TileSyncResult};

use crate::engine::{emit, EventSender, PlaybackBackend, PlaybackEngine};

/// Position reports per second while playing.
const POSITION_POLL_HZ: u32 = 10;

/// How long to wait for a newly opened clip to preroll.
const PREROLL_TIMEOUT_SECS: u64 = 10;

fn init_gstreamer() -> TileSyncResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(TileSyncError::playback(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Backend that plays clips through GStreamer.
#[derive(Debug, Clone, Default)]
pub struct GstBackend;

impl GstBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackBackend for GstBackend {
    fn open(
        &self,
        clip: ClipId,
        locator: &Path,
        events: EventSender,
    ) -> TileSyncResult<Box<dyn PlaybackEngine>> {
        if !locator.is_file() {
            return Err(TileSyncError::invalid_source(locator, "not a readable file"));
        }
        init_gstreamer()?;

        let absolute = std::fs::canonicalize(locator)?;
        let uri = gst::glib::filename_to_uri(&absolute, None)
            .map_err(|e| TileSyncError::invalid_source(locator, format!("bad file URI: {e}")))?;

        let playbin = gst::ElementFactory::make("playbin")
            .name(format!("tilesync-clip-{clip}"))
            .property("uri", uri.as_str())
            .build()
            .map_err(|e| {
                TileSyncError::invalid_source(locator, format!("failed to create playbin: {e}"))
            })?;

        playbin.set_state(gst::State::Paused).map_err(|e| {
            TileSyncError::invalid_source(locator, format!("failed to preroll: {e}"))
        })?;

        let (preroll, _, _) = playbin.state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
        if let Err(e) = preroll {
            let _ = playbin.set_state(gst::State::Null);
            return Err(TileSyncError::invalid_source(
                locator,
                format!("source did not preroll: {e}"),
            ));
        }

        tracing::debug!(clip = %clip, uri = %uri, "Opened GStreamer playbin");
        Ok(Box::new(GstEngine::start(clip, playbin, events)?))
    }

    fn is_available(&self) -> bool {
        init_gstreamer().is_ok() && gst::ElementFactory::find("playbin").is_some()
    }

    fn name(&self) -> &str {
        "gstreamer"
    }
}

struct GstEngine {
    clip: ClipId,
    playbin: gst::Element,
    stop_flag: Arc<AtomicBool>,
    monitor: Option<JoinHandle<()>>,
}

impl GstEngine {
    fn start(clip: ClipId, playbin: gst::Element, events: EventSender) -> TileSyncResult<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let monitor = {
            let playbin = playbin.clone();
            let stop_flag = Arc::clone(&stop_flag);
            std::thread::Builder::new()
                .name(format!("tilesync-gst-{clip}"))
                .spawn(move || monitor_bus(clip, playbin, events, stop_flag))?
        };

        Ok(Self {
            clip,
            playbin,
            stop_flag,
            monitor: Some(monitor),
        })
    }

    fn set_state(&self, state: gst::State) -> TileSyncResult<()> {
        self.playbin.set_state(state).map_err(|e| {
            TileSyncError::playback(format!("clip {}: failed to set {state:?}: {e}", self.clip))
        })?;
        Ok(())
    }
}

impl PlaybackEngine for GstEngine {
    fn play(&mut self) -> TileSyncResult<()> {
        self.set_state(gst::State::Playing)
    }

    fn pause(&mut self) -> TileSyncResult<()> {
        self.set_state(gst::State::Paused)
    }

    fn stop(&mut self) -> TileSyncResult<()> {
        self.set_state(gst::State::Paused)?;
        self.seek(0)
    }

    fn seek(&mut self, position_ms: u64) -> TileSyncResult<()> {
        self.playbin
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
                gst::ClockTime::from_mseconds(position_ms),
            )
            .map_err(|e| {
                TileSyncError::playback(format!("clip {}: seek to {position_ms} ms failed: {e}", self.clip))
            })
    }

    fn set_volume(&mut self, volume: f64) -> TileSyncResult<()> {
        self.playbin.set_property("volume", volume.clamp(0.0, 1.0));
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> TileSyncResult<()> {
        self.playbin.set_property("mute", muted);
        Ok(())
    }

    fn name(&self) -> &str {
        "gstreamer"
    }
}

impl Drop for GstEngine {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.join();
        }
        let _ = self.playbin.set_state(gst::State::Null);
    }
}

fn monitor_bus(clip: ClipId, playbin: gst::Element, events: EventSender, stop_flag: Arc<AtomicBool>) {
    let Some(bus) = playbin.bus() else {
        tracing::warn!(clip = %clip, "Playbin has no bus; no position reports");
        return;
    };

    let mut poll = RateController::new(POSITION_POLL_HZ);
    let started = Instant::now();
    let mut duration_sent = None;
    let mut size_sent = None;

    while !stop_flag.load(Ordering::Relaxed) {
        if let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(poll.interval_ms())) {
            match msg.view() {
                gst::MessageView::Error(err) => {
                    tracing::warn!(
                        clip = %clip,
                        error = %err.error(),
                        debug = ?err.debug(),
                        "GStreamer playback error"
                    );
                    emit(&events, PlaybackEvent::state(clip, PlaybackState::Stopped));
                }
                gst::MessageView::Eos(_) => {
                    emit(&events, PlaybackEvent::state(clip, PlaybackState::Paused));
                }
                gst::MessageView::StateChanged(change)
                    if msg.src() == Some(playbin.upcast_ref::<gst::Object>()) =>
                {
                    if let Some(state) = playback_state(change.current()) {
                        emit(&events, PlaybackEvent::state(clip, state));
                    }
                }
                _ => {}
            }
        }

        if duration_sent.is_none() {
            if let Some(duration) = playbin.query_duration::<gst::ClockTime>() {
                duration_sent = Some(duration.mseconds());
                emit(&events, PlaybackEvent::duration(clip, duration.mseconds()));
            }
        }
        if size_sent.is_none() {
            if let Some((width, height)) = video_size(&playbin) {
                size_sent = Some((width, height));
                emit(&events, PlaybackEvent::aspect_ratio(clip, width, height));
            }
        }

        let now_ms = started.elapsed().as_millis() as u64;
        if playbin.current_state() == gst::State::Playing && poll.should_tick(now_ms) {
            if let Some(position) = playbin.query_position::<gst::ClockTime>() {
                emit(&events, PlaybackEvent::position(clip, position.mseconds()));
            }
        }
    }
}

fn playback_state(state: gst::State) -> Option<PlaybackState> {
    match state {
        gst::State::Playing => Some(PlaybackState::Playing),
        gst::State::Paused => Some(PlaybackState::Paused),
        gst::State::Ready | gst::State::Null => Some(PlaybackState::Stopped),
        _ => None,
    }
}

/// Display size of the first video stream, honoring pixel aspect ratio.
fn video_size(playbin: &gst::Element) -> Option<(u32, u32)> {
    let pad = playbin.emit_by_name::<Option<gst::Pad>>("get-video-pad", &[&0i32])?;
    let caps = pad.current_caps()?;
    let structure = caps.structure(0)?;
    let width = structure.get::<i32>("width").ok()?;
    let height = structure.get::<i32>("height").ok()?;

    let width = match structure.get::<gst::Fraction>("pixel-aspect-ratio") {
        Ok(par) if par.numer() > 0 && par.denom() > 0 && par.numer() != par.denom() => {
            (width as f64 * par.numer() as f64 / par.denom() as f64).round() as i32
        }
        _ => width,
    };

    (width > 0 && height > 0).then_some((width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventQueue;

    #[test]
    fn test_open_rejects_missing_file() {
        let queue = EventQueue::new();
        let err = GstBackend::new()
            .open(ClipId(0), Path::new("/no/such/clip.mp4"), queue.sender())
            .err()
            .unwrap();
        assert!(matches!(err, TileSyncError::InvalidSource { .. }));
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(playback_state(gst::State::Playing), Some(PlaybackState::Playing));
        assert_eq!(playback_state(gst::State::Paused), Some(PlaybackState::Paused));
        assert_eq!(playback_state(gst::State::Null), Some(PlaybackState::Stopped));
        assert_eq!(playback_state(gst::State::VoidPending), None);
    }
}
