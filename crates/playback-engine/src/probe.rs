//! Media probing through `ffprobe`.
//!
//! Duration and display geometry are read from `ffprobe -print_format json`.
//! Display geometry honors the sample aspect ratio and container rotation,
//! so a portrait phone clip stored as 1920x1080 with `rotate=90` reports
//! 1080x1920.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use tilesync_clip_model::AspectRatio;
use tilesync_common::clock::secs_to_ms;
use tilesync_common::error::{TileSyncError, TileSyncResult};

/// What the prober learned about a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration_ms: Option<u64>,
    /// Display width x height after SAR and rotation.
    pub display_size: Option<(u32, u32)>,
    pub has_video: bool,
    pub has_audio: bool,
}

impl MediaInfo {
    pub fn aspect(&self) -> Option<AspectRatio> {
        self.display_size.and_then(|(w, h)| AspectRatio::new(w, h))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_aspect_ratio: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Check whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Probe `path` with `ffprobe`. Fails with `InvalidSource` when the file
/// cannot be read as media.
pub fn probe_media(path: &Path) -> TileSyncResult<MediaInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| TileSyncError::invalid_source(path, format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TileSyncError::invalid_source(
            path,
            format!("ffprobe rejected the file: {}", stderr.trim()),
        ));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let info = parse_probe_json(&raw)
        .map_err(|e| TileSyncError::invalid_source(path, format!("unreadable ffprobe output: {e}")))?;

    tracing::debug!(
        path = %path.display(),
        duration_ms = ?info.duration_ms,
        size = ?info.display_size,
        audio = info.has_audio,
        "Probed media"
    );
    Ok(info)
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_json(raw: &str) -> TileSyncResult<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_str(raw)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let duration_ms = probe
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| video.and_then(|v| parse_seconds(v.duration.as_deref())))
        .map(secs_to_ms);

    let display_size = video.and_then(display_size);

    Ok(MediaInfo {
        duration_ms,
        display_size,
        has_video: video.is_some(),
        has_audio,
    })
}

fn display_size(stream: &ProbeStream) -> Option<(u32, u32)> {
    let (width, height) = (stream.width?, stream.height?);
    if width == 0 || height == 0 {
        return None;
    }

    let width = match stream.sample_aspect_ratio.as_deref().and_then(parse_ratio) {
        Some((num, den)) if num != den => {
            ((width as f64 * num as f64 / den as f64).round() as u32).max(1)
        }
        _ => width,
    };

    if rotation_degrees(stream).rem_euclid(180) == 90 {
        Some((height, width))
    } else {
        Some((width, height))
    }
}

/// ffprobe prints `N/A` for unknown durations.
fn parse_seconds(raw: Option<&str>) -> Option<f64> {
    raw?.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

/// `"16:11"` → `(16, 11)`. ffprobe reports `0:1` for unknown SAR.
fn parse_ratio(raw: &str) -> Option<(u32, u32)> {
    let (num, den) = raw.split_once(':')?;
    let num: u32 = num.trim().parse().ok()?;
    let den: u32 = den.trim().parse().ok()?;
    (num > 0 && den > 0).then_some((num, den))
}

fn rotation_degrees(stream: &ProbeStream) -> i64 {
    if let Some(rotate) = stream.tags.get("rotate").and_then(|r| r.trim().parse::<i64>().ok()) {
        return rotate;
    }
    stream
        .side_data_list
        .iter()
        .find_map(|entry| entry.get("rotation").and_then(|r| r.as_f64()))
        .map(|r| r.round() as i64)
        .unwrap_or(0)
}
