//! Playback event types.
//!
//! Each clip's playback engine reports metadata and transport changes
//! asynchronously. Events are plain values queued to the session owner,
//! which applies them in arrival order.

use serde::{Deserialize, Serialize};

use crate::clip::{AspectRatio, ClipId};
use crate::transport::PlaybackState;

/// A notification from one clip's playback engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    /// The clip the engine belongs to.
    pub clip: ClipId,

    /// The event payload.
    #[serde(flatten)]
    pub kind: PlaybackEventKind,
}

/// Discriminated union of engine notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEventKind {
    /// Media duration became known.
    DurationKnown { duration_ms: u64 },

    /// Natural frame geometry became known.
    AspectRatioKnown { width: u32, height: u32 },

    /// Current playback position.
    PositionChanged { position_ms: u64 },

    /// Engine transport changed.
    StateChanged { state: PlaybackState },
}

impl PlaybackEvent {
    pub fn duration(clip: ClipId, duration_ms: u64) -> Self {
        Self {
            clip,
            kind: PlaybackEventKind::DurationKnown { duration_ms },
        }
    }

    pub fn aspect_ratio(clip: ClipId, width: u32, height: u32) -> Self {
        Self {
            clip,
            kind: PlaybackEventKind::AspectRatioKnown { width, height },
        }
    }

    pub fn position(clip: ClipId, position_ms: u64) -> Self {
        Self {
            clip,
            kind: PlaybackEventKind::PositionChanged { position_ms },
        }
    }

    pub fn state(clip: ClipId, state: PlaybackState) -> Self {
        Self {
            clip,
            kind: PlaybackEventKind::StateChanged { state },
        }
    }

    /// The aspect ratio carried by an `AspectRatioKnown` event, if valid.
    pub fn aspect(&self) -> Option<AspectRatio> {
        match self.kind {
            PlaybackEventKind::AspectRatioKnown { width, height } => {
                AspectRatio::new(width, height)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = PlaybackEvent::duration(ClipId(2), 60_000);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"clip":2,"type":"duration_known","duration_ms":60000}"#);

        let back: PlaybackEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_aspect_accessor() {
        let event = PlaybackEvent::aspect_ratio(ClipId(0), 1280, 720);
        assert_eq!(event.aspect(), AspectRatio::new(1280, 720));

        let degenerate = PlaybackEvent::aspect_ratio(ClipId(0), 0, 720);
        assert_eq!(degenerate.aspect(), None);

        assert_eq!(PlaybackEvent::position(ClipId(0), 5).aspect(), None);
    }
}
