//! Export coordination.
//!
//! `ExportCoordinator::export` runs on the session owner: it pauses the
//! transport, builds the composition graph, writes it into a private
//! scratch directory and hands the job to a background task. The task runs
//! the transcoder, delivers the file and removes the scratch directory
//! exactly once, whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use tilesync_clip_model::Clip;
use tilesync_common::config::ExportDefaults;
use tilesync_common::error::{TileSyncError, TileSyncResult};
use tilesync_playback_engine::SyncController;

use crate::graph::{CompositionGraphBuilder, FilterGraph, GraphConfig};
use crate::progress::{ExportProgress, ExportStage, ProgressCallback};
use crate::transcode::{
    EncodingParams, FfmpegTranscoder, TranscodeOutcome, TranscodeRequest, Transcoder,
};

/// File name of the filter script inside the scratch directory.
pub const FILTER_SCRIPT_NAME: &str = "filter_graph.txt";

static EXPORT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Turns a session into a grid video.
pub struct ExportCoordinator {
    transcoder: Arc<dyn Transcoder>,
    graph: GraphConfig,
    encoding: EncodingParams,
    scratch_root: PathBuf,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for ExportCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCoordinator")
            .field("transcoder", &self.transcoder.name())
            .field("graph", &self.graph)
            .field("encoding", &self.encoding)
            .field("scratch_root", &self.scratch_root)
            .finish_non_exhaustive()
    }
}

impl ExportCoordinator {
    /// Coordinator with default graph and encoding settings.
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            transcoder,
            graph: GraphConfig::default(),
            encoding: EncodingParams::default(),
            scratch_root: std::env::temp_dir(),
            progress: None,
        }
    }

    /// ffmpeg coordinator configured from the config file.
    pub fn from_config(defaults: &ExportDefaults) -> Self {
        let mut coordinator = Self::new(Arc::new(FfmpegTranscoder::new()));
        coordinator.graph = GraphConfig::from(defaults);
        coordinator.encoding = EncodingParams::from(&defaults.encoding);
        if let Some(dir) = &defaults.scratch_dir {
            coordinator.scratch_root = dir.clone();
        }
        coordinator
    }

    pub fn with_graph_config(mut self, graph: GraphConfig) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingParams) -> Self {
        self.encoding = encoding;
        self
    }

    /// Directory under which per-export scratch directories are created.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn transcoder(&self) -> &dyn Transcoder {
        self.transcoder.as_ref()
    }

    /// Build the graph the current session would export.
    pub fn plan(&self, controller: &SyncController) -> TileSyncResult<FilterGraph> {
        let clips: Vec<Clip> = controller.clips().cloned().collect();
        if clips.is_empty() {
            return Err(TileSyncError::EmptyInput);
        }
        CompositionGraphBuilder::new(self.graph.clone()).build(&clips, &controller.tile_assignment())
    }

    /// Start exporting the session to `destination`.
    ///
    /// Returns as soon as the transcoder is dispatched. Must be called
    /// from within a Tokio runtime.
    pub fn export(
        &self,
        controller: &mut SyncController,
        destination: impl Into<PathBuf>,
    ) -> TileSyncResult<ExportHandle> {
        let destination = destination.into();

        if let Err(e) = controller.pause() {
            tracing::warn!(error = %e, "Failed to pause every clip before export");
        }

        let graph = self.plan(controller)?;
        let audio_input = audio_source(controller, &graph);

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            TileSyncError::unsupported(format!("export needs a Tokio runtime: {e}"))
        })?;

        let scratch = ScratchDir::create(&self.scratch_root)?;
        let filter_script = scratch.path().join(FILTER_SCRIPT_NAME);
        std::fs::write(&filter_script, graph.to_script())?;

        let extension = destination
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let request = TranscodeRequest {
            inputs: graph.inputs.clone(),
            filter_script,
            output_label: graph.output_label.clone(),
            encoding: self.encoding.clone(),
            audio_input,
            output: scratch.path().join(format!("export.{extension}")),
            expected_duration_ms: graph.duration_ms,
        };

        tracing::info!(
            clips = graph.inputs.len(),
            rows = graph.rows,
            columns = graph.columns,
            canvas = %format!("{}x{}", graph.canvas_width, graph.canvas_height),
            audio_input = ?audio_input,
            transcoder = self.transcoder.name(),
            scratch = %scratch.path().display(),
            destination = %destination.display(),
            "Starting export"
        );

        if let Some(cb) = &self.progress {
            cb(ExportProgress::stage(ExportStage::Preparing));
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let job = ExportJob {
            transcoder: Arc::clone(&self.transcoder),
            request,
            scratch,
            destination: destination.clone(),
            progress: self.progress.clone(),
        };
        let started = Instant::now();
        let task = runtime.spawn(job.run(cancel_rx, started));

        Ok(ExportHandle {
            cancel: ExportCanceller(Arc::new(cancel_tx)),
            task,
            destination,
            started,
        })
    }
}

/// First input whose clip is audible.
fn audio_source(controller: &SyncController, graph: &FilterGraph) -> Option<usize> {
    graph.input_clips.iter().position(|id| {
        controller
            .clip(*id)
            .is_some_and(|clip| !controller.session().effective_mute(clip))
    })
}

/// Cancels an export from anywhere, e.g. a signal handler task.
#[derive(Debug, Clone)]
pub struct ExportCanceller(Arc<watch::Sender<bool>>);

impl ExportCanceller {
    /// Ask the transcoder to stop. No effect once the export has finished.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// A running export.
#[derive(Debug)]
pub struct ExportHandle {
    cancel: ExportCanceller,
    task: JoinHandle<ExportReport>,
    destination: PathBuf,
    started: Instant,
}

impl ExportHandle {
    /// Ask the transcoder to stop. No effect once the export has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn canceller(&self) -> ExportCanceller {
        self.cancel.clone()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the single completion report.
    pub async fn wait(self) -> ExportReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => ExportReport {
                destination: self.destination,
                result: Err(TileSyncError::Other(anyhow::anyhow!("export task failed: {e}"))),
                cleanup_warning: None,
                elapsed: self.started.elapsed(),
            },
        }
    }
}

/// Outcome of an export.
#[derive(Debug)]
pub struct ExportReport {
    pub destination: PathBuf,
    /// Output path, `TranscodeFailed` or `Cancelled`.
    pub result: TileSyncResult<PathBuf>,
    /// Set when the scratch directory could not be removed.
    pub cleanup_warning: Option<TileSyncError>,
    pub elapsed: Duration,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> TileSyncResult<PathBuf> {
        self.result
    }
}

struct ExportJob {
    transcoder: Arc<dyn Transcoder>,
    request: TranscodeRequest,
    scratch: ScratchDir,
    destination: PathBuf,
    progress: Option<ProgressCallback>,
}

impl ExportJob {
    async fn run(mut self, cancel: watch::Receiver<bool>, started: Instant) -> ExportReport {
        let outcome = self
            .transcoder
            .transcode(&self.request, cancel, self.progress.clone())
            .await;

        let result = match outcome {
            TranscodeOutcome::Completed => {
                self.report(ExportStage::Finalizing);
                deliver(&self.request.output, &self.destination).map(|()| self.destination.clone())
            }
            TranscodeOutcome::Failed {
                status,
                diagnostics,
            } => Err(TileSyncError::transcode_failed(status, diagnostics)),
            TranscodeOutcome::Cancelled => Err(TileSyncError::Cancelled),
        };

        let cleanup_warning = self.scratch.cleanup().err();

        let elapsed = started.elapsed();
        match &result {
            Ok(path) => {
                self.report(ExportStage::Complete);
                tracing::info!(
                    output = %path.display(),
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Export complete"
                );
            }
            Err(TileSyncError::Cancelled) => {
                self.report(ExportStage::Cancelled);
                tracing::info!(elapsed_secs = elapsed.as_secs_f64(), "Export cancelled");
            }
            Err(e) => {
                self.report(ExportStage::Failed);
                tracing::error!(error = %e, "Export failed");
            }
        }

        ExportReport {
            destination: self.destination,
            result,
            cleanup_warning,
            elapsed,
        }
    }

    fn report(&self, stage: ExportStage) {
        if let Some(cb) = &self.progress {
            cb(ExportProgress::stage(stage));
        }
    }
}

/// Move the finished file into place, copying across filesystems.
fn deliver(from: &Path, to: &Path) -> TileSyncResult<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if let Err(e) = std::fs::rename(from, to) {
        tracing::debug!(error = %e, "Rename failed, copying export instead");
        std::fs::copy(from, to)?;
    }
    Ok(())
}

/// Private per-export working directory.
#[derive(Debug)]
struct ScratchDir {
    path: PathBuf,
    cleaned: bool,
}

impl ScratchDir {
    fn create(root: &Path) -> TileSyncResult<Self> {
        let name = format!(
            "tilesync-export-{}-{}-{}",
            std::process::id(),
            EXPORT_SEQ.fetch_add(1, Ordering::Relaxed),
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f")
        );
        let path = root.join(name);
        std::fs::create_dir_all(&path)?;
        tracing::debug!(path = %path.display(), "Created scratch directory");
        Ok(Self {
            path,
            cleaned: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory. Only the first call does anything.
    fn cleanup(&mut self) -> Result<(), TileSyncError> {
        if self.cleaned {
            return Ok(());
        }
        self.cleaned = true;
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch directory"
                );
                Err(TileSyncError::cleanup_warning(&self.path, e.to_string()))
            }
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.cleaned {
            let _ = self.cleanup();
        }
    }
}
