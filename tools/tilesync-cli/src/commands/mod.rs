pub mod check;
pub mod export;
pub mod layout;
pub mod plan;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use tilesync_common::config::AppConfig;
use tilesync_playback_engine::backend::HeadlessBackend;
use tilesync_playback_engine::{SessionConfig, SyncController};

use crate::GridArgs;

/// How long to wait for ffprobe results before giving up on a clip.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Session policy from the config file, overridden by command-line grid options.
pub fn session_config(config: &AppConfig, grid: &GridArgs) -> anyhow::Result<SessionConfig> {
    let mut session = SessionConfig::from_app_config(config)?;
    if let Some(spec) = grid.grid {
        session.tiles_per_row = spec.tiles_per_row();
    }
    if let Some(per_row) = grid.per_row {
        session.tiles_per_row = per_row;
    }
    if let Some(pattern) = grid.pattern {
        session.pattern = pattern;
    }
    Ok(session)
}

/// Open every file headlessly and wait for its geometry. A clip whose
/// container reports no duration still loads; it is seeked and stretched
/// like any other clip only once a duration is known.
pub async fn load_session(
    files: &[PathBuf],
    session: SessionConfig,
) -> anyhow::Result<SyncController> {
    let mut controller = SyncController::new(Box::new(HeadlessBackend::new()), session)?;
    for file in files {
        controller
            .add_clip(file)
            .with_context(|| format!("Failed to load {}", file.display()))?;
    }

    if !controller.wait_for_geometry(METADATA_TIMEOUT).await {
        anyhow::bail!("Timed out reading clip geometry; is ffprobe installed?");
    }
    for clip in controller.clips().filter(|clip| clip.duration_ms.is_none()) {
        tracing::warn!(clip = %clip.display_name(), "Clip reports no duration");
    }
    Ok(controller)
}
