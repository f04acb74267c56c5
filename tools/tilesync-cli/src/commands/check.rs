//! Check for external tools.

use tilesync_playback_engine::backend::{default_backend, HeadlessBackend};
use tilesync_playback_engine::PlaybackBackend;
use tilesync_render_engine::{FfmpegTranscoder, Transcoder};

pub fn run() -> anyhow::Result<()> {
    println!("TileSync System Check");
    println!("{}", "=".repeat(50));

    let transcoder = FfmpegTranscoder::new();
    let ffmpeg = transcoder.is_available();
    report(ffmpeg, "ffmpeg", "needed by `tilesync export`");

    let ffprobe = HeadlessBackend::new().is_available();
    report(ffprobe, "ffprobe", "needed to probe clip duration and geometry");

    let backend = default_backend();
    println!("[OK] Playback backend: {}", backend.name());

    println!();
    if ffmpeg && ffprobe {
        println!("All required tools are available. TileSync is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg and make sure it is on PATH.");
    }

    Ok(())
}

fn report(available: bool, tool: &str, purpose: &str) {
    if available {
        println!("[OK] {tool}");
    } else {
        println!("[MISSING] {tool}: {purpose}");
    }
}
