//! Master-timeline synchronization.
//!
//! The [`SyncController`] is the single owner of a [`Session`]. Transport,
//! seek and audio commands fan out to every clip's engine; engine reports
//! come back through the event queue and are applied by [`SyncController::pump`]
//! or an owner loop built on [`SyncController::next_event`].
//!
//! Clips of different lengths are kept in step proportionally: seeking the
//! master timeline to `t` of `T` puts a clip of length `d` at
//! `round(t / T * d)`.

use std::path::Path;
use std::time::Duration;

use tilesync_clip_model::{
    AspectRatio, Clip, ClipId, LayoutPattern, PlaybackEvent, PlaybackEventKind, PlaybackState,
    TileAssignment, TransportState,
};
use tilesync_common::clock::DriftMeasurement;
use tilesync_common::error::{TileSyncError, TileSyncResult};
use tilesync_layout_core::grid::GridLayoutAssigner;

use crate::engine::{EventSender, PlaybackBackend};
use crate::events::EventQueue;
use crate::registry::ClipRegistry;
use crate::session::{Session, SessionConfig};

/// Position of a clip of `clip_duration_ms` that corresponds to
/// `master_position_ms` on a master timeline of `master_duration_ms`.
pub fn proportional_target(
    master_position_ms: u64,
    master_duration_ms: u64,
    clip_duration_ms: u64,
) -> u64 {
    if master_duration_ms == 0 {
        return 0;
    }
    let ratio = master_position_ms as f64 / master_duration_ms as f64;
    ((ratio * clip_duration_ms as f64).round() as u64).min(clip_duration_ms)
}

/// Owner of the playback session.
#[derive(Debug)]
pub struct SyncController {
    session: Session,
    queue: EventQueue,
    config: SessionConfig,
    /// Lowest normalized position a report must reach to move the master
    /// position. `None` accepts any report.
    reference_ratio: Option<f64>,
    /// Master position at which the current frame of reference started.
    /// Clips run at native speed from their proportional position here.
    anchor_ms: u64,
}

impl SyncController {
    /// Create a controller with an empty session.
    ///
    /// Fails with `OutOfRange` when the configured tiles per row is zero.
    pub fn new(backend: Box<dyn PlaybackBackend>, config: SessionConfig) -> TileSyncResult<Self> {
        let layout = GridLayoutAssigner::new(config.tiles_per_row, config.pattern)?;
        let queue = EventQueue::new();

        tracing::info!(
            backend = backend.name(),
            max_clips = ?config.max_clips,
            tiles_per_row = config.tiles_per_row,
            pattern = %config.pattern,
            "Playback session created"
        );

        let registry = ClipRegistry::new(backend, queue.sender());
        Ok(Self {
            session: Session::new(registry, layout),
            queue,
            config,
            reference_ratio: None,
            anchor_ms: 0,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Sender for events produced outside the registered engines.
    pub fn event_sender(&self) -> EventSender {
        self.queue.sender()
    }

    /// Clips in registry order.
    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.session.registry.iter()
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.session.registry.get(id)
    }

    pub fn transport(&self) -> TransportState {
        self.session.transport
    }

    pub fn master_position_ms(&self) -> u64 {
        self.session.master_position_ms
    }

    pub fn master_duration_ms(&self) -> u64 {
        self.session.master_duration_ms
    }

    // -----------------------------------------------------------------
    // Clip management
    // -----------------------------------------------------------------

    /// Load a clip, enforcing the `max_clips` policy.
    ///
    /// The new engine picks up the current global volume and mute, and
    /// starts playing if the session is playing.
    pub fn add_clip(&mut self, locator: impl AsRef<Path>) -> TileSyncResult<ClipId> {
        if let Some(limit) = self.config.max_clips {
            if self.session.registry.len() >= limit {
                return Err(TileSyncError::LimitReached { limit });
            }
        }

        let id = self.session.registry.add(locator)?;
        self.join_session(id);
        Ok(id)
    }

    /// Unload a clip. The master duration is recomputed and the master
    /// position clamped into the new range.
    pub fn remove_clip(&mut self, id: ClipId) -> TileSyncResult<()> {
        self.session.registry.remove(id)?;

        if self.session.registry.is_empty() {
            self.session.transport = TransportState::Stopped;
            self.session.master_position_ms = 0;
        }
        if self.session.recompute_master_duration() {
            self.restart_frame();
        }
        Ok(())
    }

    fn join_session(&mut self, id: ClipId) {
        let volume = self.session.global_volume;
        let muted = self.session.global_muted;
        let playing = self.session.transport == TransportState::Playing;
        let Some(entry) = self.session.registry.get_mut(id) else {
            return;
        };

        let (clip, engine) = entry.parts_mut();
        let result = engine
            .set_volume(volume)
            .and_then(|_| engine.set_muted(muted || clip.muted))
            .and_then(|_| if playing { engine.play() } else { Ok(()) });

        match result {
            Ok(()) => {
                clip.volume = volume;
                if playing {
                    clip.playback = PlaybackState::Playing;
                }
            }
            Err(e) => {
                tracing::warn!(clip = %id, error = %e, "Failed to bring new clip in line with session");
            }
        }
    }

    // -----------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------

    /// Stopped/Paused → Playing. A no-op when already playing or when no
    /// clips are loaded.
    pub fn play(&mut self) -> TileSyncResult<()> {
        if self.session.registry.is_empty() {
            tracing::debug!("Play requested with no clips loaded");
            return Ok(());
        }
        if self.session.transport == TransportState::Playing {
            return Ok(());
        }

        let result = self.session.registry.fan_out(|clip, engine| {
            tracing::debug!(clip = %clip.id, "Play");
            engine.play()?;
            clip.playback = PlaybackState::Playing;
            Ok(())
        });

        self.session.transport = TransportState::Playing;
        tracing::info!(
            clips = self.session.registry.len(),
            position_ms = self.session.master_position_ms,
            "Playback started"
        );
        result
    }

    /// Playing → Paused. A no-op when not playing or when no clips are
    /// loaded.
    pub fn pause(&mut self) -> TileSyncResult<()> {
        if self.session.registry.is_empty() || self.session.transport != TransportState::Playing {
            return Ok(());
        }

        let result = self.session.registry.fan_out(|clip, engine| {
            tracing::debug!(clip = %clip.id, "Pause");
            engine.pause()?;
            clip.playback = PlaybackState::Paused;
            Ok(())
        });

        self.session.transport = TransportState::Paused;
        tracing::info!(position_ms = self.session.master_position_ms, "Playback paused");
        result
    }

    /// Any state → Stopped, master position back to 0.
    pub fn stop(&mut self) -> TileSyncResult<()> {
        let result = self.session.registry.fan_out(|clip, engine| {
            tracing::debug!(clip = %clip.id, "Stop");
            engine.stop()?;
            clip.playback = PlaybackState::Stopped;
            clip.position_ms = 0;
            Ok(())
        });

        self.session.transport = TransportState::Stopped;
        self.session.master_position_ms = 0;
        self.restart_frame();
        tracing::info!("Playback stopped");
        result
    }

    /// Seek every clip with a known duration to its proportional position.
    ///
    /// Clips with unknown or zero duration are left where they are. The
    /// transport state does not change.
    pub fn seek_master(&mut self, target_ms: u64) -> TileSyncResult<()> {
        let master = self.session.master_duration_ms;
        if target_ms > master {
            return Err(TileSyncError::out_of_range(format!(
                "seek target {target_ms} ms outside [0, {master}] ms"
            )));
        }

        let seek_result = if master == 0 {
            Ok(())
        } else {
            self.session.registry.fan_out(|clip, engine| {
                let Some(duration) = clip.syncable_duration_ms() else {
                    return Ok(());
                };
                let target = proportional_target(target_ms, master, duration);
                tracing::debug!(clip = %clip.id, target_ms = target, "Seek");
                engine.seek(target)?;
                clip.position_ms = target;
                Ok(())
            })
        };

        self.session.master_position_ms = target_ms;
        self.reference_ratio = (master > 0).then(|| target_ms as f64 / master as f64);
        self.anchor_ms = target_ms;

        // Some engines drop out of playing on a flushing seek.
        let resume_result = if self.session.transport == TransportState::Playing {
            self.session.registry.fan_out(|clip, engine| {
                engine.play()?;
                clip.playback = PlaybackState::Playing;
                Ok(())
            })
        } else {
            Ok(())
        };

        tracing::info!(position_ms = target_ms, duration_ms = master, "Master seek");
        seek_result.and(resume_result)
    }

    // -----------------------------------------------------------------
    // Audio
    // -----------------------------------------------------------------

    /// Set the volume of every clip without an individual mute.
    ///
    /// A non-zero volume clears a global mute.
    pub fn set_global_volume(&mut self, volume: f64) -> TileSyncResult<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(TileSyncError::out_of_range(format!(
                "volume {volume} outside [0.0, 1.0]"
            )));
        }

        let unmute = volume > 0.0 && self.session.global_muted;
        self.session.global_volume = volume;
        if unmute {
            self.session.global_muted = false;
        }

        tracing::debug!(volume, unmute, "Global volume");
        self.session.registry.fan_out(|clip, engine| {
            if unmute {
                engine.set_muted(clip.muted)?;
            }
            if clip.muted {
                return Ok(());
            }
            engine.set_volume(volume)?;
            clip.volume = volume;
            Ok(())
        })
    }

    /// Mute every clip, or restore each clip's individual mute state.
    pub fn set_global_mute(&mut self, muted: bool) -> TileSyncResult<()> {
        self.session.global_muted = muted;
        tracing::debug!(muted, "Global mute");
        self.session
            .registry
            .fan_out(|clip, engine| engine.set_muted(muted || clip.muted))
    }

    /// Set one clip's individual mute. An unmuted clip also picks up the
    /// current global volume.
    pub fn set_clip_mute(&mut self, id: ClipId, muted: bool) -> TileSyncResult<()> {
        let global_muted = self.session.global_muted;
        let volume = self.session.global_volume;
        let entry = self
            .session
            .registry
            .get_mut(id)
            .ok_or_else(|| TileSyncError::not_found(id.index()))?;

        let (clip, engine) = entry.parts_mut();
        clip.muted = muted;
        engine.set_muted(global_muted || muted)?;
        if !muted {
            engine.set_volume(volume)?;
            clip.volume = volume;
        }
        tracing::debug!(clip = %id, muted, "Clip mute");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------

    /// Fails with `OutOfRange` when `tiles_per_row` is zero.
    pub fn set_tiles_per_row(&mut self, tiles_per_row: usize) -> TileSyncResult<()> {
        self.session.layout = GridLayoutAssigner::new(tiles_per_row, self.session.pattern())?;
        Ok(())
    }

    pub fn set_layout_pattern(&mut self, pattern: LayoutPattern) {
        self.session.layout = self.session.layout.with_pattern(pattern);
    }

    /// Current clips laid out with the session's grid settings.
    pub fn tile_assignment(&self) -> TileAssignment {
        self.session.layout.assign(&self.session.registry.ids())
    }

    // -----------------------------------------------------------------
    // Engine reports
    // -----------------------------------------------------------------

    /// Apply a single engine event.
    pub fn apply_event(&mut self, event: PlaybackEvent) -> TileSyncResult<()> {
        let clip = event.clip;
        match event.kind {
            PlaybackEventKind::DurationKnown { duration_ms } => {
                self.on_clip_duration_report(clip, duration_ms)
            }
            PlaybackEventKind::AspectRatioKnown { width, height } => {
                self.on_clip_aspect_report(clip, width, height)
            }
            PlaybackEventKind::PositionChanged { position_ms } => {
                self.on_clip_position_report(clip, position_ms)
            }
            PlaybackEventKind::StateChanged { state } => self.on_clip_state_changed(clip, state),
        }
    }

    /// Apply every queued event without waiting. Returns how many were
    /// taken off the queue.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.queue.try_next() {
            self.dispatch(event);
            count += 1;
        }
        count
    }

    /// Wait for the next engine event. The caller applies it with
    /// [`apply_event`](Self::apply_event).
    pub async fn next_event(&mut self) -> Option<PlaybackEvent> {
        self.queue.next().await
    }

    /// Apply events until every clip has a known duration and geometry or
    /// `timeout` elapses. Returns whether every clip is probed.
    pub async fn wait_for_metadata(&mut self, timeout: Duration) -> bool {
        self.wait_for_clips(timeout, Clip::is_probed, "metadata").await
    }

    /// Apply events until every clip has a known geometry or `timeout`
    /// elapses. Durations may still be unknown, as for live sources.
    pub async fn wait_for_geometry(&mut self, timeout: Duration) -> bool {
        self.wait_for_clips(timeout, |clip| clip.aspect.is_some(), "geometry")
            .await
    }

    async fn wait_for_clips(
        &mut self,
        timeout: Duration,
        ready: fn(&Clip) -> bool,
        what: &str,
    ) -> bool {
        self.pump();
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.clips().all(ready) {
            match tokio::time::timeout_at(deadline, self.queue.next()).await {
                Ok(Some(event)) => self.dispatch(event),
                Ok(None) | Err(_) => break,
            }
        }

        let pending: Vec<String> = self
            .clips()
            .filter(|clip| !ready(clip))
            .map(Clip::display_name)
            .collect();
        if !pending.is_empty() {
            tracing::warn!(?pending, "Timed out waiting for clip {what}");
        }
        pending.is_empty()
    }

    fn dispatch(&mut self, event: PlaybackEvent) {
        let clip = event.clip;
        match self.apply_event(event) {
            Ok(()) => {}
            Err(TileSyncError::NotFound { .. }) => {
                tracing::warn!(clip = %clip, "Dropping event for a clip that is no longer loaded");
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(clip = %clip, error = %e, "Failed to apply playback event");
            }
            Err(e) => {
                tracing::error!(clip = %clip, error = %e, "Failed to apply playback event");
            }
        }
    }

    /// Record a clip's duration and update the master duration.
    ///
    /// A clip whose duration arrives while the master timeline is away from
    /// zero is moved to its proportional position.
    pub fn on_clip_duration_report(&mut self, id: ClipId, duration_ms: u64) -> TileSyncResult<()> {
        let was_unknown = self
            .session
            .registry
            .get(id)
            .ok_or_else(|| TileSyncError::not_found(id.index()))?
            .duration_ms
            .is_none();

        self.session.registry.report_duration(id, duration_ms)?;
        if self.session.recompute_master_duration() {
            self.restart_frame();
        }

        let master = self.session.master_duration_ms;
        let position = self.session.master_position_ms;
        if was_unknown && duration_ms > 0 && position > 0 {
            if let Some(entry) = self.session.registry.get_mut(id) {
                let target = proportional_target(position, master, duration_ms);
                let (clip, engine) = entry.parts_mut();
                engine.seek(target)?;
                clip.position_ms = target;
                tracing::debug!(clip = %id, target_ms = target, "Aligned late clip to master");
            }
        }
        Ok(())
    }

    /// Record a clip's natural geometry. Degenerate sizes are ignored.
    pub fn on_clip_aspect_report(&mut self, id: ClipId, width: u32, height: u32) -> TileSyncResult<()> {
        match AspectRatio::new(width, height) {
            Some(aspect) => self.session.registry.report_aspect_ratio(id, aspect),
            None => {
                tracing::warn!(clip = %id, width, height, "Ignoring degenerate clip geometry");
                Ok(())
            }
        }
    }

    /// Record a clip's position and, while playing, advance the master
    /// position.
    ///
    /// Only the [reference clip](Self::reference_clip) moves the master
    /// position; its report is normalized by its duration. Within one frame
    /// of reference only reports at or past the last accepted ratio count,
    /// so late reports never move the master position backwards.
    pub fn on_clip_position_report(&mut self, id: ClipId, position_ms: u64) -> TileSyncResult<()> {
        let master = self.session.master_duration_ms;

        let (duration, playing) = {
            let entry = self
                .session
                .registry
                .get_mut(id)
                .ok_or_else(|| TileSyncError::not_found(id.index()))?;
            let clip = entry.clip_mut();
            clip.position_ms = position_ms;
            (clip.syncable_duration_ms(), clip.is_playing())
        };

        let Some(duration) = duration else {
            return Ok(());
        };
        if !playing || master == 0 {
            return Ok(());
        }

        if self.reference_clip() != Some(id) {
            self.check_drift(id, position_ms);
            return Ok(());
        }

        let ratio = (position_ms as f64 / duration as f64).min(1.0);
        if let Some(floor) = self.reference_ratio {
            if ratio < floor {
                tracing::trace!(clip = %id, position_ms, "Ignoring late position report");
                return Ok(());
            }
        }

        self.reference_ratio = Some(ratio);
        self.session.master_position_ms = ((ratio * master as f64).round() as u64).min(master);
        Ok(())
    }

    /// Clip whose timeline is the master timeline: the playing clip with
    /// the longest known duration, lowest id first on ties. When the
    /// longest clip is not playing the next-longest playing clip stands in.
    pub fn reference_clip(&self) -> Option<ClipId> {
        self.clips()
            .filter(|clip| clip.is_playing())
            .filter_map(|clip| clip.syncable_duration_ms().map(|d| (clip.id, d)))
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(id, _)| id)
    }

    /// Start a new frame of reference at the current master position.
    fn restart_frame(&mut self) {
        self.reference_ratio = None;
        self.anchor_ms = self.session.master_position_ms;
    }

    /// Record a state change reported by a clip's engine.
    pub fn on_clip_state_changed(&mut self, id: ClipId, state: PlaybackState) -> TileSyncResult<()> {
        let entry = self
            .session
            .registry
            .get_mut(id)
            .ok_or_else(|| TileSyncError::not_found(id.index()))?;
        let clip = entry.clip_mut();
        if clip.playback != state {
            tracing::debug!(clip = %id, state = ?state, "Clip state changed");
        }
        clip.playback = state;
        Ok(())
    }

    /// Where a clip playing at native speed should be at the current master
    /// position: its proportional position when the frame of reference
    /// started, advanced by the master time elapsed since, capped at its end.
    pub fn expected_position_ms(&self, id: ClipId) -> Option<u64> {
        let duration_ms = self.clip(id)?.syncable_duration_ms()?;
        let master_ms = self.session.master_duration_ms;
        let position_ms = self.session.master_position_ms;
        let anchor_ms = self.anchor_ms.min(position_ms);
        let expected = proportional_target(anchor_ms, master_ms, duration_ms)
            .saturating_add(position_ms - anchor_ms)
            .min(duration_ms);
        Some(expected)
    }

    fn check_drift(&self, id: ClipId, position_ms: u64) {
        let Some(expected) = self.expected_position_ms(id) else {
            return;
        };
        let drift = DriftMeasurement {
            reference_ms: expected,
            measured_ms: position_ms,
        };
        if drift.exceeds_threshold_ms(self.config.drift_threshold_ms) {
            tracing::warn!(
                clip = %id,
                drift_ms = drift.drift_ms(),
                expected_ms = drift.reference_ms,
                position_ms,
                "Clip drifted from master timeline"
            );
        }
    }
}
