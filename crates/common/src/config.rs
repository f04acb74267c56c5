//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default grid layout settings.
    #[serde(default)]
    pub layout: LayoutDefaults,

    /// Playback and synchronization policy.
    #[serde(default)]
    pub playback: PlaybackDefaults,

    /// Export settings.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default grid layout parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutDefaults {
    /// Tiles per grid row (>= 1).
    pub tiles_per_row: usize,

    /// Layout pattern name: `row_major` or `serpentine`.
    pub pattern: String,
}

/// Playback policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackDefaults {
    /// Maximum number of loaded clips (`None` = unlimited).
    pub max_clips: Option<usize>,

    /// Drift (ms) between a clip and its proportional target before a
    /// warning is logged.
    pub drift_threshold_ms: u64,
}

/// Export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDefaults {
    /// Width every tile is scaled to.
    pub tile_width: u32,

    /// Margin (px) added around the stacked grid.
    pub margin: u32,

    /// Background color for letterbox pads, fillers, and margins.
    pub background: String,

    /// Encoder settings passed to the transcoder.
    #[serde(default)]
    pub encoding: EncodingDefaults,

    /// Parent directory for per-export scratch space (defaults to the
    /// system temp dir).
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

/// Encoder defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingDefaults {
    pub video_codec: String,
    pub crf: u32,
    pub preset: String,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate_kbps: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tilesync=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for LayoutDefaults {
    fn default() -> Self {
        Self {
            tiles_per_row: 2,
            pattern: "row_major".to_string(),
        }
    }
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            max_clips: Some(9),
            drift_threshold_ms: 250,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            tile_width: 640,
            margin: 10,
            background: "black".to_string(),
            encoding: EncodingDefaults::default(),
            scratch_dir: None,
        }
    }
}

impl Default for EncodingDefaults {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            crf: 23,
            preset: "medium".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 192,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Directory under which export scratch directories are created.
    pub fn scratch_root(&self) -> PathBuf {
        self.export
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("tilesync").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.layout.tiles_per_row, 2);
        assert_eq!(config.playback.max_clips, Some(9));
        assert_eq!(config.export.tile_width, 640);
        assert_eq!(config.export.encoding.pixel_format, "yuv420p");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"playback":{"max_clips":null,"drift_threshold_ms":100}}"#)
                .unwrap();
        assert_eq!(config.playback.max_clips, None);
        assert_eq!(config.playback.drift_threshold_ms, 100);
        assert_eq!(config.layout.pattern, "row_major");
        assert_eq!(config.export.margin, 10);
    }

    #[test]
    fn test_scratch_root_override() {
        let mut config = AppConfig::default();
        assert_eq!(config.scratch_root(), std::env::temp_dir());
        config.export.scratch_dir = Some(PathBuf::from("/var/tmp/tilesync"));
        assert_eq!(config.scratch_root(), PathBuf::from("/var/tmp/tilesync"));
    }
}
