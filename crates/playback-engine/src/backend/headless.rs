//! Headless backend.
//!
//! Nothing is decoded or shown. Files are validated and probed with
//! `ffprobe` when opened; each engine keeps a wall-clock transport so
//! positions advance while "playing" and report back like a real player.

use std::path::Path;
use std::time::Instant;

use tilesync_clip_model::{ClipId, PlaybackEvent, PlaybackState};
use tilesync_common::error::{TileSyncError, TileSyncResult};

use crate::engine::{emit, EventSender, PlaybackBackend, PlaybackEngine};
use crate::probe::{command_exists, probe_media};

/// Backend that probes media and simulates playback.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend;

impl HeadlessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackBackend for HeadlessBackend {
    fn open(
        &self,
        clip: ClipId,
        locator: &Path,
        events: EventSender,
    ) -> TileSyncResult<Box<dyn PlaybackEngine>> {
        if !locator.is_file() {
            return Err(TileSyncError::invalid_source(locator, "not a readable file"));
        }

        let info = probe_media(locator)?;
        if !info.has_video {
            return Err(TileSyncError::invalid_source(locator, "no video stream"));
        }

        if let Some(duration_ms) = info.duration_ms {
            emit(&events, PlaybackEvent::duration(clip, duration_ms));
        }
        if let Some((width, height)) = info.display_size {
            emit(&events, PlaybackEvent::aspect_ratio(clip, width, height));
        }

        Ok(Box::new(HeadlessEngine::new(clip, info.duration_ms, events)))
    }

    fn is_available(&self) -> bool {
        command_exists("ffprobe")
    }

    fn name(&self) -> &str {
        "headless"
    }
}

/// Simulated player: position = anchor + time spent playing since then.
struct HeadlessEngine {
    clip: ClipId,
    duration_ms: Option<u64>,
    events: EventSender,
    state: PlaybackState,
    anchor_ms: u64,
    playing_since: Option<Instant>,
    volume: f64,
    muted: bool,
}

impl HeadlessEngine {
    fn new(clip: ClipId, duration_ms: Option<u64>, events: EventSender) -> Self {
        Self {
            clip,
            duration_ms,
            events,
            state: PlaybackState::Stopped,
            anchor_ms: 0,
            playing_since: None,
            volume: 1.0,
            muted: false,
        }
    }

    fn position_ms(&self) -> u64 {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.clamp(self.anchor_ms.saturating_add(elapsed))
    }

    fn clamp(&self, position_ms: u64) -> u64 {
        match self.duration_ms {
            Some(duration) => position_ms.min(duration),
            None => position_ms,
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            emit(&self.events, PlaybackEvent::state(self.clip, state));
        }
    }

    fn report_position(&self) {
        emit(&self.events, PlaybackEvent::position(self.clip, self.position_ms()));
    }
}

impl PlaybackEngine for HeadlessEngine {
    fn play(&mut self) -> TileSyncResult<()> {
        if self.state != PlaybackState::Playing {
            self.playing_since = Some(Instant::now());
            self.set_state(PlaybackState::Playing);
        }
        Ok(())
    }

    fn pause(&mut self) -> TileSyncResult<()> {
        self.anchor_ms = self.position_ms();
        self.playing_since = None;
        self.set_state(PlaybackState::Paused);
        self.report_position();
        Ok(())
    }

    fn stop(&mut self) -> TileSyncResult<()> {
        self.anchor_ms = 0;
        self.playing_since = None;
        self.set_state(PlaybackState::Stopped);
        self.report_position();
        Ok(())
    }

    fn seek(&mut self, position_ms: u64) -> TileSyncResult<()> {
        self.anchor_ms = self.clamp(position_ms);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
        self.report_position();
        Ok(())
    }

    fn set_volume(&mut self, volume: f64) -> TileSyncResult<()> {
        self.volume = volume;
        tracing::trace!(clip = %self.clip, volume, muted = self.muted, "Headless volume");
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> TileSyncResult<()> {
        self.muted = muted;
        tracing::trace!(clip = %self.clip, volume = self.volume, muted, "Headless mute");
        Ok(())
    }

    fn name(&self) -> &str {
        "headless"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventQueue;
    use tilesync_clip_model::PlaybackEventKind;

    #[test]
    fn test_open_rejects_missing_file() {
        let queue = EventQueue::new();
        let err = HeadlessBackend::new()
            .open(ClipId(0), Path::new("/definitely/not/here.mp4"), queue.sender())
            .err()
            .unwrap();
        assert!(matches!(err, TileSyncError::InvalidSource { .. }));
    }

    #[test]
    fn test_open_rejects_directory() {
        let queue = EventQueue::new();
        let dir = std::env::temp_dir();
        let err = HeadlessBackend::new()
            .open(ClipId(0), &dir, queue.sender())
            .err()
            .unwrap();
        assert!(matches!(err, TileSyncError::InvalidSource { .. }));
    }

    #[test]
    fn test_seek_and_pause_report_positions() {
        let mut queue = EventQueue::new();
        let mut engine = HeadlessEngine::new(ClipId(2), Some(10_000), queue.sender());

        engine.seek(4_000).unwrap();
        engine.seek(99_000).unwrap();
        engine.pause().unwrap();

        assert_eq!(queue.try_next(), Some(PlaybackEvent::position(ClipId(2), 4_000)));
        assert_eq!(queue.try_next(), Some(PlaybackEvent::position(ClipId(2), 10_000)));
        assert_eq!(
            queue.try_next(),
            Some(PlaybackEvent::state(ClipId(2), PlaybackState::Paused))
        );
        assert_eq!(queue.try_next(), Some(PlaybackEvent::position(ClipId(2), 10_000)));
    }

    #[test]
    fn test_clock_advances_only_while_playing() {
        let mut queue = EventQueue::new();
        let mut engine = HeadlessEngine::new(ClipId(0), None, queue.sender());

        engine.play().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(30));
        engine.pause().unwrap();
        let paused_at = engine.position_ms();
        assert!(paused_at >= 30);

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(engine.position_ms(), paused_at);

        engine.stop().unwrap();
        assert_eq!(engine.position_ms(), 0);

        let states: Vec<PlaybackState> = std::iter::from_fn(|| queue.try_next())
            .filter_map(|event| match event.kind {
                PlaybackEventKind::StateChanged { state } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![PlaybackState::Playing, PlaybackState::Paused, PlaybackState::Stopped]
        );
    }
}
