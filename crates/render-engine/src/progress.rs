//! Export progress reporting.
//!
//! ffmpeg's `-progress pipe:1` output is a stream of `key=value` lines
//! terminated by a `progress=continue|end` line per update.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Progress callback for exports. Invoked from the export task.
pub type ProgressCallback = Arc<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0]. Stays 0 while the duration is unknown.
    pub progress: f64,

    /// Output time encoded so far.
    pub out_time_ms: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

impl ExportProgress {
    pub fn stage(stage: ExportStage) -> Self {
        let progress = if stage == ExportStage::Complete { 1.0 } else { 0.0 };
        Self {
            progress,
            out_time_ms: 0,
            eta_secs: 0.0,
            stage,
        }
    }
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Preparing,
    Encoding,
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

#[derive(Debug, Default)]
pub(crate) struct ProgressState {
    pub(crate) out_time_secs: f64,
    pub(crate) complete: bool,
}

impl ProgressState {
    pub(crate) fn update(&mut self, key: &str, value: &str) {
        match key {
            // Despite the name, ffmpeg reports microseconds here.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = (us / 1_000_000.0).max(0.0);
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }
}

pub(crate) fn progress_report(
    state: &ProgressState,
    expected_duration_secs: Option<f64>,
    elapsed_secs: f64,
) -> ExportProgress {
    let progress = match expected_duration_secs {
        Some(total) if total > 0.0 => (state.out_time_secs / total).clamp(0.0, 1.0),
        _ => 0.0,
    };

    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    ExportProgress {
        progress: if state.complete { 1.0 } else { progress },
        out_time_ms: (state.out_time_secs * 1_000.0).round() as u64,
        eta_secs,
        stage: if state.complete {
            ExportStage::Finalizing
        } else {
            ExportStage::Encoding
        },
    }
}
