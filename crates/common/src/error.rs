//! Error types shared across TileSync crates.

use std::path::PathBuf;

/// Top-level error type for TileSync operations.
#[derive(Debug, thiserror::Error)]
pub enum TileSyncError {
    /// The playback backend could not open the source; the clip never
    /// enters the registry.
    #[error("Invalid source {path}: {message}")]
    InvalidSource { path: PathBuf, message: String },

    #[error("Clip {index} not found")]
    NotFound { index: usize },

    #[error("Out of range: {message}")]
    OutOfRange { message: String },

    #[error("Nothing to export: no clips are loaded")]
    EmptyInput,

    /// Aspect probing has not completed for at least one clip.
    #[error("Unknown geometry for clip {index} ({path})")]
    UnknownGeometry { index: usize, path: PathBuf },

    #[error("Transcode failed ({status}): {diagnostics}")]
    TranscodeFailed { status: String, diagnostics: String },

    /// Scratch removal failed. Never fails an otherwise successful export.
    #[error("Cleanup warning for {path}: {message}")]
    CleanupWarning { path: PathBuf, message: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("Clip limit reached ({limit} clips)")]
    LimitReached { limit: usize },

    #[error("Playback error: {message}")]
    Playback { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using TileSyncError.
pub type TileSyncResult<T> = Result<T, TileSyncError>;

impl TileSyncError {
    pub fn invalid_source(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::InvalidSource {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn not_found(index: usize) -> Self {
        Self::NotFound { index }
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange {
            message: msg.into(),
        }
    }

    pub fn transcode_failed(status: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::TranscodeFailed {
            status: status.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn cleanup_warning(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::CleanupWarning {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the caller can recover by re-probing or changing input and
    /// retrying the same operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidSource { .. }
                | Self::NotFound { .. }
                | Self::OutOfRange { .. }
                | Self::EmptyInput
                | Self::UnknownGeometry { .. }
                | Self::LimitReached { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_failure_carries_diagnostics() {
        let err = TileSyncError::transcode_failed("exit status: 1", "Invalid filter graph");
        let text = err.to_string();
        assert!(text.contains("exit status: 1"));
        assert!(text.contains("Invalid filter graph"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(TileSyncError::EmptyInput.is_recoverable());
        assert!(TileSyncError::not_found(3).is_recoverable());
        assert!(!TileSyncError::Cancelled.is_recoverable());
        assert!(!TileSyncError::transcode_failed("1", "boom").is_recoverable());
    }
}
