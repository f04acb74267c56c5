//! Compose clips into a grid video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tilesync_common::clock::{format_hms, format_transport};
use tilesync_common::config::AppConfig;
use tilesync_render_engine::{
    ExportCoordinator, ExportProgress, ExportStage, GraphConfig, Transcoder,
};

use crate::GridArgs;

pub struct ExportArgs {
    pub files: Vec<PathBuf>,
    pub output: PathBuf,
    pub grid: GridArgs,
    pub tile_width: Option<u32>,
    pub muted: Vec<usize>,
    pub no_audio: bool,
}

pub async fn run(config: &AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    let session = super::session_config(config, &args.grid)?;
    let mut controller = super::load_session(&args.files, session).await?;

    let ids: Vec<_> = controller.clips().map(|c| c.id).collect();
    for index in &args.muted {
        let id = ids
            .get(*index)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("--mute {index}: only {} clip(s) loaded", ids.len()))?;
        controller.set_clip_mute(id, true)?;
    }
    if args.no_audio {
        controller.set_global_mute(true)?;
    }

    let mut graph_config = GraphConfig::from(&config.export);
    if let Some(width) = args.tile_width {
        graph_config.tile_width = width;
    }

    let total_ms = controller.master_duration_ms();
    let progress_cb = Arc::new(move |p: ExportProgress| match p.stage {
        ExportStage::Encoding => {
            if total_ms > 0 {
                eprint!(
                    "\r  Progress: {:.1}% {} (ETA: {:.0}s)  ",
                    p.progress * 100.0,
                    format_transport(p.out_time_ms.min(total_ms), total_ms),
                    p.eta_secs
                );
            } else {
                eprint!("\r  Encoded: {}  ", format_hms(p.out_time_ms));
            }
            let _ = std::io::stderr().flush();
        }
        ExportStage::Finalizing => {
            eprint!("\r  Finalizing...                                  ");
            let _ = std::io::stderr().flush();
        }
        _ => {}
    });

    let coordinator = ExportCoordinator::from_config(&config.export)
        .with_graph_config(graph_config)
        .with_progress(progress_cb);
    if !coordinator.transcoder().is_available() {
        anyhow::bail!("ffmpeg not found on PATH; run `tilesync check`");
    }

    println!("Exporting {} clip(s)", args.files.len());
    println!("  Output: {}", args.output.display());

    let handle = coordinator.export(&mut controller, &args.output)?;

    let canceller = handle.canceller();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Cancelling...");
            canceller.cancel();
        }
    });

    let report = handle.wait().await;
    ctrl_c.abort();
    eprintln!();

    if let Some(warning) = &report.cleanup_warning {
        println!("  [WARN] {warning}");
    }

    match report.result {
        Ok(path) => {
            println!(
                "Export complete: {} ({:.1}s)",
                path.display(),
                report.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Export failed: {e}")),
    }
}
