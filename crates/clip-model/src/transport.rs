//! Transport and layout selection types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Master transport state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Playback state of one clip's engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// How clips are laid into grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutPattern {
    /// Left to right on every row.
    #[default]
    RowMajor,
    /// Alternating direction: odd rows run right to left.
    Serpentine,
}

impl LayoutPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RowMajor => "row_major",
            Self::Serpentine => "serpentine",
        }
    }
}

impl fmt::Display for LayoutPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a layout pattern name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPattern(pub String);

impl fmt::Display for UnknownPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown layout pattern '{}' (expected row-major or serpentine)",
            self.0
        )
    }
}

impl std::error::Error for UnknownPattern {}

impl FromStr for LayoutPattern {
    type Err = UnknownPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "row_major" | "rowmajor" => Ok(Self::RowMajor),
            "serpentine" | "zigzag" | "boustrophedon" => Ok(Self::Serpentine),
            _ => Err(UnknownPattern(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_parsing() {
        assert_eq!("row-major".parse::<LayoutPattern>(), Ok(LayoutPattern::RowMajor));
        assert_eq!("row_major".parse::<LayoutPattern>(), Ok(LayoutPattern::RowMajor));
        assert_eq!("Serpentine".parse::<LayoutPattern>(), Ok(LayoutPattern::Serpentine));
        assert_eq!("zigzag".parse::<LayoutPattern>(), Ok(LayoutPattern::Serpentine));
        assert!("spiral".parse::<LayoutPattern>().is_err());
    }

    #[test]
    fn test_pattern_serde_matches_display() {
        let json = serde_json::to_string(&LayoutPattern::Serpentine).unwrap();
        assert_eq!(json, "\"serpentine\"");
        assert_eq!(LayoutPattern::Serpentine.to_string(), "serpentine");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(TransportState::default(), TransportState::Stopped);
        assert_eq!(LayoutPattern::default(), LayoutPattern::RowMajor);
    }
}
