//! Loaded clips and their probed metadata.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::transport::PlaybackState;

/// Stable clip identity: insertion index, never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub usize);

impl ClipId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Natural frame geometry of a clip (display width x height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Returns `None` for degenerate (zero-sized) geometry.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    /// Width divided by height.
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Height of a frame scaled to `target_width` with this aspect,
    /// rounded to the nearest even value (encoders reject odd dimensions).
    pub fn even_height_for_width(&self, target_width: u32) -> u32 {
        let exact = target_width as f64 * self.height as f64 / self.width as f64;
        let even = ((exact / 2.0).round() as u32) * 2;
        even.max(2)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A loaded clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Stable identity.
    pub id: ClipId,

    /// Source locator.
    pub locator: PathBuf,

    /// Duration in milliseconds; `None` until the engine reports it.
    pub duration_ms: Option<u64>,

    /// Natural aspect ratio; `None` until the engine reports it.
    pub aspect: Option<AspectRatio>,

    /// Individual mute override.
    pub muted: bool,

    /// Volume last applied to the engine [0.0, 1.0].
    pub volume: f64,

    /// Last position reported by the engine.
    pub position_ms: u64,

    /// Last playback state reported by (or commanded to) the engine.
    pub playback: PlaybackState,
}

impl Clip {
    pub fn new(id: ClipId, locator: impl Into<PathBuf>) -> Self {
        Self {
            id,
            locator: locator.into(),
            duration_ms: None,
            aspect: None,
            muted: false,
            volume: 1.0,
            position_ms: 0,
            playback: PlaybackState::Stopped,
        }
    }

    /// Duration if known and non-zero; such clips take part in
    /// proportional sync.
    pub fn syncable_duration_ms(&self) -> Option<u64> {
        self.duration_ms.filter(|d| *d > 0)
    }

    /// Whether both duration and geometry have been probed.
    pub fn is_probed(&self) -> bool {
        self.duration_ms.is_some() && self.aspect.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playback == PlaybackState::Playing
    }

    /// File name for display, falling back to the full locator.
    pub fn display_name(&self) -> String {
        self.locator
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.locator.display().to_string())
    }

    pub fn locator(&self) -> &Path {
        &self.locator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_rejects_degenerate_geometry() {
        assert!(AspectRatio::new(0, 1080).is_none());
        assert!(AspectRatio::new(1920, 0).is_none());
        assert!(AspectRatio::new(1920, 1080).is_some());
    }

    #[test]
    fn test_even_height_for_width() {
        let hd = AspectRatio::new(1920, 1080).unwrap();
        assert_eq!(hd.even_height_for_width(640), 360);
        assert!((hd.ratio() - 16.0 / 9.0).abs() < 1e-9);

        // 640 * 3 / 4 = 480 exactly
        let sd = AspectRatio::new(640, 480).unwrap();
        assert_eq!(sd.even_height_for_width(640), 480);

        // 640 / 2.35 = 272.34 -> nearest even 272
        let scope = AspectRatio::new(2350, 1000).unwrap();
        assert_eq!(scope.even_height_for_width(640), 272);

        // 640 * 9 / 21 = 274.28 -> nearest even 274
        let ultrawide = AspectRatio::new(21, 9).unwrap();
        assert_eq!(ultrawide.even_height_for_width(640), 274);

        // Portrait: 640 * 16 / 9 = 1137.7 -> 1138
        let portrait = AspectRatio::new(1080, 1920).unwrap();
        assert_eq!(portrait.even_height_for_width(640), 1138);
    }

    #[test]
    fn test_even_height_never_below_two() {
        let sliver = AspectRatio::new(10_000, 1).unwrap();
        assert_eq!(sliver.even_height_for_width(640), 2);
    }

    #[test]
    fn test_new_clip_is_unprobed() {
        let clip = Clip::new(ClipId(0), "/media/a.mp4");
        assert!(!clip.is_probed());
        assert_eq!(clip.syncable_duration_ms(), None);
        assert_eq!(clip.display_name(), "a.mp4");
        assert_eq!(clip.volume, 1.0);
    }

    #[test]
    fn test_zero_duration_is_not_syncable() {
        let mut clip = Clip::new(ClipId(1), "b.mov");
        clip.duration_ms = Some(0);
        assert_eq!(clip.syncable_duration_ms(), None);
        clip.duration_ms = Some(5_000);
        assert_eq!(clip.syncable_duration_ms(), Some(5_000));
    }
}
