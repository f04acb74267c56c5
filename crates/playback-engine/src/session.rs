//! Playback session state.
//!
//! A [`Session`] is the single aggregate behind the master timeline. It is
//! owned by the [`SyncController`](crate::sync::SyncController); nothing
//! else holds a mutable reference to it.

use serde::{Deserialize, Serialize};

use tilesync_clip_model::{Clip, LayoutPattern, TransportState};
use tilesync_common::config::AppConfig;
use tilesync_common::error::{TileSyncError, TileSyncResult};
use tilesync_layout_core::grid::GridLayoutAssigner;

use crate::registry::ClipRegistry;

/// Policy knobs a session is created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Caller-side ceiling on loaded clips; `None` disables it.
    pub max_clips: Option<usize>,

    /// Drift above this is logged as a warning.
    pub drift_threshold_ms: u64,

    pub tiles_per_row: usize,
    pub pattern: LayoutPattern,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_clips: Some(9),
            drift_threshold_ms: 250,
            tiles_per_row: 2,
            pattern: LayoutPattern::RowMajor,
        }
    }
}

impl SessionConfig {
    /// Derive session policy from the application config file.
    pub fn from_app_config(config: &AppConfig) -> TileSyncResult<Self> {
        let pattern: LayoutPattern = config
            .layout
            .pattern
            .parse()
            .map_err(|e| TileSyncError::config(format!("layout.pattern: {e}")))?;
        if config.layout.tiles_per_row == 0 {
            return Err(TileSyncError::config("layout.tiles_per_row must be at least 1"));
        }
        Ok(Self {
            max_clips: config.playback.max_clips,
            drift_threshold_ms: config.playback.drift_threshold_ms,
            tiles_per_row: config.layout.tiles_per_row,
            pattern,
        })
    }
}

/// Ordered clips plus global transport, volume and layout state.
#[derive(Debug)]
pub struct Session {
    pub(crate) registry: ClipRegistry,
    pub(crate) global_volume: f64,
    pub(crate) global_muted: bool,
    pub(crate) transport: TransportState,
    pub(crate) master_position_ms: u64,
    pub(crate) master_duration_ms: u64,
    pub(crate) layout: GridLayoutAssigner,
}

impl Session {
    pub fn new(registry: ClipRegistry, layout: GridLayoutAssigner) -> Self {
        Self {
            registry,
            global_volume: 1.0,
            global_muted: false,
            transport: TransportState::Stopped,
            master_position_ms: 0,
            master_duration_ms: 0,
            layout,
        }
    }

    pub fn registry(&self) -> &ClipRegistry {
        &self.registry
    }

    pub fn global_volume(&self) -> f64 {
        self.global_volume
    }

    pub fn is_globally_muted(&self) -> bool {
        self.global_muted
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn master_position_ms(&self) -> u64 {
        self.master_position_ms
    }

    pub fn master_duration_ms(&self) -> u64 {
        self.master_duration_ms
    }

    pub fn tiles_per_row(&self) -> usize {
        self.layout.tiles_per_row()
    }

    pub fn pattern(&self) -> LayoutPattern {
        self.layout.pattern()
    }

    pub fn layout(&self) -> &GridLayoutAssigner {
        &self.layout
    }

    /// Whether the clip's engine is effectively muted.
    pub fn effective_mute(&self, clip: &Clip) -> bool {
        self.global_muted || clip.muted
    }

    /// Recompute the master duration from the registry, clamping the master
    /// position into the new range. Returns `true` if the duration changed.
    pub(crate) fn recompute_master_duration(&mut self) -> bool {
        let duration = self.registry.max_known_duration();
        if duration == self.master_duration_ms {
            return false;
        }

        let previous = self.master_duration_ms;
        self.master_duration_ms = duration;
        if self.master_position_ms > duration {
            self.master_position_ms = duration;
        }

        tracing::debug!(
            previous_ms = previous,
            duration_ms = duration,
            position_ms = self.master_position_ms,
            "Master duration changed"
        );
        true
    }

    /// Serializable view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            transport: self.transport,
            master_position_ms: self.master_position_ms,
            master_duration_ms: self.master_duration_ms,
            global_volume: self.global_volume,
            global_muted: self.global_muted,
            tiles_per_row: self.tiles_per_row(),
            pattern: self.pattern(),
            clips: self.registry.all(),
        }
    }
}

/// Point-in-time copy of session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub transport: TransportState,
    pub master_position_ms: u64,
    pub master_duration_ms: u64,
    pub global_volume: f64,
    pub global_muted: bool,
    pub tiles_per_row: usize,
    pub pattern: LayoutPattern,
    pub clips: Vec<Clip>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_from_defaults() {
        let config = SessionConfig::from_app_config(&AppConfig::default()).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_session_config_rejects_bad_layout() {
        let mut app = AppConfig::default();
        app.layout.pattern = "spiral".into();
        let err = SessionConfig::from_app_config(&app).unwrap_err();
        assert!(matches!(err, TileSyncError::Config { .. }));

        let mut app = AppConfig::default();
        app.layout.tiles_per_row = 0;
        assert!(SessionConfig::from_app_config(&app).is_err());
    }

    #[test]
    fn test_session_config_reads_playback_policy() {
        let mut app = AppConfig::default();
        app.playback.max_clips = None;
        app.playback.drift_threshold_ms = 100;
        app.layout.pattern = "serpentine".into();
        app.layout.tiles_per_row = 3;

        let config = SessionConfig::from_app_config(&app).unwrap();
        assert_eq!(config.max_clips, None);
        assert_eq!(config.drift_threshold_ms, 100);
        assert_eq!(config.tiles_per_row, 3);
        assert_eq!(config.pattern, LayoutPattern::Serpentine);
    }
}
