//! In-memory backend with preset media.
//!
//! Every locator must be registered up front with its metadata. Opening an
//! unknown locator fails like a missing file would. Engines report the
//! preset metadata as soon as they are opened and record every command
//! in a log shared by all clones of the backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tilesync_clip_model::{ClipId, PlaybackEvent};
use tilesync_common::error::{TileSyncError, TileSyncResult};

use crate::engine::{emit, EventSender, PlaybackBackend, PlaybackEngine};

/// Metadata a scripted engine reports when opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedMedia {
    pub duration_ms: Option<u64>,
    pub dimensions: Option<(u32, u32)>,
    /// Every command on this engine fails.
    pub failing: bool,
}

impl ScriptedMedia {
    pub fn new(duration_ms: u64, width: u32, height: u32) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            dimensions: Some((width, height)),
            failing: false,
        }
    }

    /// Media with geometry but no duration, like a live stream.
    pub fn live(width: u32, height: u32) -> Self {
        Self {
            dimensions: Some((width, height)),
            ..Self::default()
        }
    }

    /// Media whose metadata never arrives.
    pub fn unprobed() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

/// A command received by a scripted engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Play,
    Pause,
    Stop,
    Seek(u64),
    SetVolume(f64),
    SetMuted(bool),
}

type CommandLog = Arc<Mutex<Vec<(ClipId, EngineCommand)>>>;

fn lock(log: &CommandLog) -> MutexGuard<'_, Vec<(ClipId, EngineCommand)>> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Backend serving [`ScriptedMedia`] by locator.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    media: HashMap<PathBuf, ScriptedMedia>,
    log: CommandLog,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_media(mut self, locator: impl Into<PathBuf>, media: ScriptedMedia) -> Self {
        self.media.insert(locator.into(), media);
        self
    }

    /// Every recorded command, in order.
    pub fn commands(&self) -> Vec<(ClipId, EngineCommand)> {
        lock(&self.log).clone()
    }

    /// Commands received by one clip's engine.
    pub fn commands_for(&self, clip: ClipId) -> Vec<EngineCommand> {
        lock(&self.log)
            .iter()
            .filter(|(id, _)| *id == clip)
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn clear_commands(&self) {
        lock(&self.log).clear();
    }
}

impl PlaybackBackend for ScriptedBackend {
    fn open(
        &self,
        clip: ClipId,
        locator: &Path,
        events: EventSender,
    ) -> TileSyncResult<Box<dyn PlaybackEngine>> {
        let media = self
            .media
            .get(locator)
            .cloned()
            .ok_or_else(|| TileSyncError::invalid_source(locator, "no scripted media for locator"))?;

        if let Some(duration_ms) = media.duration_ms {
            emit(&events, PlaybackEvent::duration(clip, duration_ms));
        }
        if let Some((width, height)) = media.dimensions {
            emit(&events, PlaybackEvent::aspect_ratio(clip, width, height));
        }

        Ok(Box::new(ScriptedEngine {
            clip,
            failing: media.failing,
            log: Arc::clone(&self.log),
        }))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedEngine {
    clip: ClipId,
    failing: bool,
    log: CommandLog,
}

impl ScriptedEngine {
    fn record(&self, command: EngineCommand) -> TileSyncResult<()> {
        lock(&self.log).push((self.clip, command.clone()));
        if self.failing {
            return Err(TileSyncError::playback(format!(
                "scripted engine {} rejected {command:?}",
                self.clip
            )));
        }
        Ok(())
    }
}

impl PlaybackEngine for ScriptedEngine {
    fn play(&mut self) -> TileSyncResult<()> {
        self.record(EngineCommand::Play)
    }

    fn pause(&mut self) -> TileSyncResult<()> {
        self.record(EngineCommand::Pause)
    }

    fn stop(&mut self) -> TileSyncResult<()> {
        self.record(EngineCommand::Stop)
    }

    fn seek(&mut self, position_ms: u64) -> TileSyncResult<()> {
        self.record(EngineCommand::Seek(position_ms))
    }

    fn set_volume(&mut self, volume: f64) -> TileSyncResult<()> {
        self.record(EngineCommand::SetVolume(volume))
    }

    fn set_muted(&mut self, muted: bool) -> TileSyncResult<()> {
        self.record(EngineCommand::SetMuted(muted))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
