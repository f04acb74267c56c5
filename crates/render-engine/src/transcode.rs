//! Transcoder contract and the ffmpeg implementation.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

use tilesync_common::clock::ms_to_secs;
use tilesync_common::config::EncodingDefaults;
use tilesync_playback_engine::probe::command_exists;

use crate::progress::{progress_report, ExportProgress, ProgressCallback, ProgressState};

/// Lines of ffmpeg stderr kept as failure diagnostics.
const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// Cancellation flag observed by a running transcode. `true` means cancel.
pub type CancelSignal = watch::Receiver<bool>;

/// Output encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingParams {
    pub video_codec: String,
    pub crf: u32,
    pub preset: String,
    pub pixel_format: String,
    /// Move the MP4 index to the front for progressive playback.
    pub faststart: bool,
    pub audio_codec: String,
    pub audio_bitrate_kbps: u32,
}

impl Default for EncodingParams {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            crf: 23,
            preset: "medium".to_string(),
            pixel_format: "yuv420p".to_string(),
            faststart: true,
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 192,
        }
    }
}

impl From<&EncodingDefaults> for EncodingParams {
    fn from(defaults: &EncodingDefaults) -> Self {
        Self {
            video_codec: defaults.video_codec.clone(),
            crf: defaults.crf,
            preset: defaults.preset.clone(),
            pixel_format: defaults.pixel_format.clone(),
            faststart: true,
            audio_codec: defaults.audio_codec.clone(),
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
        }
    }
}

/// Everything a transcoder needs to produce the grid video.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    /// Ordered input files; index `i` is ffmpeg input `i`.
    pub inputs: Vec<PathBuf>,
    /// File holding the filtergraph.
    pub filter_script: PathBuf,
    /// Filtergraph label carrying the composed video.
    pub output_label: String,
    pub encoding: EncodingParams,
    /// Input whose audio is kept, if any.
    pub audio_input: Option<usize>,
    pub output: PathBuf,
    /// Longest clip duration, for progress estimates.
    pub expected_duration_ms: Option<u64>,
}

impl TranscodeRequest {
    /// Full ffmpeg argument list.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-nostdin",
            "-y",
            "-loglevel",
            "error",
            "-progress",
            "pipe:1",
            "-nostats",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.display().to_string());
        }

        args.push("-filter_complex_script".to_string());
        args.push(self.filter_script.display().to_string());
        args.push("-map".to_string());
        args.push(format!("[{}]", self.output_label));

        match self.audio_input {
            Some(index) => {
                args.push("-map".to_string());
                args.push(format!("{index}:a?"));
                args.push("-c:a".to_string());
                args.push(self.encoding.audio_codec.clone());
                args.push("-b:a".to_string());
                args.push(format!("{}k", self.encoding.audio_bitrate_kbps));
            }
            None => args.push("-an".to_string()),
        }

        args.push("-c:v".to_string());
        args.push(self.encoding.video_codec.clone());
        args.push("-crf".to_string());
        args.push(self.encoding.crf.to_string());
        args.push("-preset".to_string());
        args.push(self.encoding.preset.clone());
        args.push("-pix_fmt".to_string());
        args.push(self.encoding.pixel_format.clone());
        if self.encoding.faststart {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }

        args.push(self.output.display().to_string());
        args
    }
}

/// How a transcode ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    Completed,
    Failed { status: String, diagnostics: String },
    Cancelled,
}

/// Runs the composition to an output file.
#[async_trait::async_trait]
pub trait Transcoder: Send + Sync {
    /// Produce `request.output`. Must return promptly with `Cancelled`
    /// once `cancel` turns `true`.
    async fn transcode(
        &self,
        request: &TranscodeRequest,
        cancel: CancelSignal,
        progress: Option<ProgressCallback>,
    ) -> TranscodeOutcome;

    /// Check if this transcoder can run on the system.
    fn is_available(&self) -> bool;

    /// Transcoder name.
    fn name(&self) -> &str;
}

/// Transcoder running the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }

    /// Use a specific ffmpeg binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait::async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        request: &TranscodeRequest,
        mut cancel: CancelSignal,
        progress: Option<ProgressCallback>,
    ) -> TranscodeOutcome {
        if *cancel.borrow() {
            return TranscodeOutcome::Cancelled;
        }

        let args = request.ffmpeg_args();
        tracing::debug!(args = ?args, "Running ffmpeg");

        let mut child = match Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return TranscodeOutcome::Failed {
                    status: "not started".to_string(),
                    diagnostics: format!("Failed to start {}: {e}", self.binary.display()),
                }
            }
        };

        tracing::info!(
            pid = child.id(),
            inputs = request.inputs.len(),
            output = %request.output.display(),
            "ffmpeg process started"
        );

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut output = String::new();
                let mut reader = BufReader::new(stderr);
                if let Err(err) = reader.read_to_string(&mut output).await {
                    output.push_str(&format!("<failed to read ffmpeg stderr: {err}>"));
                }
                output
            })
        });

        let expected_secs = request.expected_duration_ms.map(ms_to_secs);
        let progress_task = child.stdout.take().map(|stdout| {
            tokio::spawn(async move {
                let started = Instant::now();
                let mut state = ProgressState::default();
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let Some((key, value)) = line.trim().split_once('=') else {
                        continue;
                    };
                    state.update(key, value);
                    if key == "progress" {
                        if let Some(cb) = &progress {
                            cb(progress_report(
                                &state,
                                expected_secs,
                                started.elapsed().as_secs_f64(),
                            ));
                        }
                    }
                }
            })
        });

        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                changed = cancel.changed() => {
                    if changed.is_err() {
                        // Nobody can cancel any more.
                        break child.wait().await;
                    }
                    if *cancel.borrow() {
                        tracing::info!("Cancelling ffmpeg");
                        if let Err(e) = child.kill().await {
                            tracing::warn!(error = %e, "Failed to kill ffmpeg");
                        }
                        if let Some(task) = progress_task {
                            let _ = task.await;
                        }
                        if let Some(task) = stderr_task {
                            let _ = task.await;
                        }
                        return TranscodeOutcome::Cancelled;
                    }
                }
            }
        };

        if let Some(task) = progress_task {
            let _ = task.await;
        }
        let stderr_output = match stderr_task {
            Some(task) => task
                .await
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string()),
            None => String::new(),
        };

        match status {
            Ok(status) if status.success() => TranscodeOutcome::Completed,
            Ok(status) => TranscodeOutcome::Failed {
                status: status.to_string(),
                diagnostics: diagnostic_tail(&stderr_output),
            },
            Err(e) => TranscodeOutcome::Failed {
                status: "unknown".to_string(),
                diagnostics: format!("Failed to wait on ffmpeg: {e}"),
            },
        }
    }

    fn is_available(&self) -> bool {
        match self.binary.to_str() {
            Some(binary) => command_exists(binary),
            None => self.binary.is_file(),
        }
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Last lines of ffmpeg stderr; the actual error is at the end.
fn diagnostic_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(audio_input: Option<usize>) -> TranscodeRequest {
        TranscodeRequest {
            inputs: vec![PathBuf::from("/in/a.mp4"), PathBuf::from("/in/b.mov")],
            filter_script: PathBuf::from("/scratch/filter_graph.txt"),
            output_label: "vout".to_string(),
            encoding: EncodingParams::default(),
            audio_input,
            output: PathBuf::from("/scratch/export.mp4"),
            expected_duration_ms: Some(10_000),
        }
    }

    fn window<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_args_with_audio_source() {
        let args = request(Some(1)).ffmpeg_args();

        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert_eq!(window(&args, "-filter_complex_script"), Some("/scratch/filter_graph.txt"));
        assert_eq!(window(&args, "-progress"), Some("pipe:1"));
        assert!(args.windows(2).any(|w| w == ["-map", "[vout]"]));
        assert!(args.windows(2).any(|w| w == ["-map", "1:a?"]));
        assert_eq!(window(&args, "-c:a"), Some("aac"));
        assert_eq!(window(&args, "-b:a"), Some("192k"));
        assert!(!args.contains(&"-an".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/scratch/export.mp4"));
    }

    #[test]
    fn test_args_default_encoding() {
        let args = request(None).ffmpeg_args();

        assert!(args.contains(&"-an".to_string()));
        assert_eq!(window(&args, "-c:v"), Some("libx264"));
        assert_eq!(window(&args, "-crf"), Some("23"));
        assert_eq!(window(&args, "-preset"), Some("medium"));
        assert_eq!(window(&args, "-pix_fmt"), Some("yuv420p"));
        assert_eq!(window(&args, "-movflags"), Some("+faststart"));
    }

    #[test]
    fn test_encoding_from_config_defaults() {
        let params = EncodingParams::from(&EncodingDefaults::default());
        assert_eq!(params, EncodingParams::default());
    }

    #[test]
    fn test_diagnostic_tail_keeps_last_lines() {
        let stderr: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let tail = diagnostic_tail(&stderr);
        assert_eq!(tail.lines().count(), DIAGNOSTIC_TAIL_LINES);
        assert!(tail.ends_with("line 99"));
        assert_eq!(diagnostic_tail("  \n"), "");
    }

    #[tokio::test]
    async fn test_missing_binary_fails_with_diagnostics() {
        let transcoder = FfmpegTranscoder::with_binary("/nonexistent/tilesync-ffmpeg");
        assert!(!transcoder.is_available());

        let (_tx, rx) = watch::channel(false);
        let outcome = transcoder.transcode(&request(None), rx, None).await;
        match outcome {
            TranscodeOutcome::Failed { diagnostics, .. } => {
                assert!(diagnostics.contains("/nonexistent/tilesync-ffmpeg"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pre_cancelled_request_never_spawns() {
        let transcoder = FfmpegTranscoder::with_binary("/nonexistent/tilesync-ffmpeg");
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let outcome = transcoder.transcode(&request(None), rx, None).await;
        assert_eq!(outcome, TranscodeOutcome::Cancelled);
    }
}
