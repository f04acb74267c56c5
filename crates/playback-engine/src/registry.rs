//! Clip registry.
//!
//! Ordered set of loaded clips, each paired with the engine that plays it.
//! Ids are handed out in insertion order and never reused, so survivors of
//! a removal keep their identity and the backing vector stays sorted by id.

use std::fmt;
use std::path::Path;

use tilesync_clip_model::{AspectRatio, Clip, ClipId};
use tilesync_common::error::{TileSyncError, TileSyncResult};

use crate::engine::{EventSender, PlaybackBackend, PlaybackEngine};

/// A registered clip and its engine.
pub struct ClipEntry {
    clip: Clip,
    engine: Box<dyn PlaybackEngine>,
}

impl ClipEntry {
    pub fn clip(&self) -> &Clip {
        &self.clip
    }

    pub fn clip_mut(&mut self) -> &mut Clip {
        &mut self.clip
    }

    /// Borrow the clip record and its engine at the same time.
    pub fn parts_mut(&mut self) -> (&mut Clip, &mut dyn PlaybackEngine) {
        (&mut self.clip, self.engine.as_mut())
    }
}

impl fmt::Debug for ClipEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipEntry")
            .field("clip", &self.clip)
            .field("engine", &self.engine.name())
            .finish()
    }
}

/// Ordered collection of loaded clips.
pub struct ClipRegistry {
    backend: Box<dyn PlaybackBackend>,
    events: EventSender,
    entries: Vec<ClipEntry>,
    next_id: usize,
}

impl ClipRegistry {
    pub fn new(backend: Box<dyn PlaybackBackend>, events: EventSender) -> Self {
        Self {
            backend,
            events,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Open `locator` through the backend and register it.
    ///
    /// On failure the clip never enters the registry and no id is consumed.
    pub fn add(&mut self, locator: impl AsRef<Path>) -> TileSyncResult<ClipId> {
        let locator = locator.as_ref();
        let id = ClipId(self.next_id);
        let engine = self.backend.open(id, locator, self.events.clone())?;
        self.next_id += 1;

        tracing::info!(
            clip = %id,
            locator = %locator.display(),
            engine = engine.name(),
            "Clip added"
        );

        self.entries.push(ClipEntry {
            clip: Clip::new(id, locator),
            engine,
        });
        Ok(id)
    }

    /// Remove a clip, stopping and dropping its engine.
    pub fn remove(&mut self, id: ClipId) -> TileSyncResult<Clip> {
        let pos = self.position_of(id)?;
        let mut entry = self.entries.remove(pos);
        if let Err(e) = entry.engine.stop() {
            tracing::warn!(clip = %id, error = %e, "Failed to stop engine of removed clip");
        }
        tracing::info!(clip = %id, remaining = self.entries.len(), "Clip removed");
        Ok(entry.clip)
    }

    /// Record a clip's duration. Repeated reports overwrite.
    pub fn report_duration(&mut self, id: ClipId, duration_ms: u64) -> TileSyncResult<()> {
        let clip = self.clip_mut(id)?;
        if clip.duration_ms != Some(duration_ms) {
            tracing::debug!(clip = %id, duration_ms, "Clip duration known");
        }
        clip.duration_ms = Some(duration_ms);
        Ok(())
    }

    /// Record a clip's natural aspect ratio. Repeated reports overwrite.
    pub fn report_aspect_ratio(&mut self, id: ClipId, aspect: AspectRatio) -> TileSyncResult<()> {
        let clip = self.clip_mut(id)?;
        if clip.aspect != Some(aspect) {
            tracing::debug!(clip = %id, aspect = %aspect, "Clip geometry known");
        }
        clip.aspect = Some(aspect);
        Ok(())
    }

    pub fn get(&self, id: ClipId) -> Option<&Clip> {
        self.position_of(id).ok().map(|pos| &self.entries[pos].clip)
    }

    pub fn get_mut(&mut self, id: ClipId) -> Option<&mut ClipEntry> {
        let pos = self.position_of(id).ok()?;
        Some(&mut self.entries[pos])
    }

    /// Clips in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.entries.iter().map(|entry| &entry.clip)
    }

    /// Snapshot of every clip in insertion order.
    pub fn all(&self) -> Vec<Clip> {
        self.iter().cloned().collect()
    }

    pub fn ids(&self) -> Vec<ClipId> {
        self.iter().map(|clip| clip.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest known duration, 0 when nothing is known.
    pub fn max_known_duration(&self) -> u64 {
        self.iter()
            .filter_map(|clip| clip.duration_ms)
            .max()
            .unwrap_or(0)
    }

    /// Whether any clip's last known state is Playing.
    pub fn any_playing(&self) -> bool {
        self.iter().any(Clip::is_playing)
    }

    /// Apply `f` to every clip and engine in order.
    ///
    /// Every clip is visited even when some fail. The first error is
    /// returned; later ones are only logged.
    pub fn fan_out<F>(&mut self, mut f: F) -> TileSyncResult<()>
    where
        F: FnMut(&mut Clip, &mut dyn PlaybackEngine) -> TileSyncResult<()>,
    {
        let mut first_error = None;
        for entry in &mut self.entries {
            let (clip, engine) = entry.parts_mut();
            if let Err(e) = f(clip, engine) {
                tracing::warn!(
                    clip = %entry.clip.id,
                    engine = entry.engine.name(),
                    error = %e,
                    "Engine command failed"
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn clip_mut(&mut self, id: ClipId) -> TileSyncResult<&mut Clip> {
        let pos = self.position_of(id)?;
        Ok(&mut self.entries[pos].clip)
    }

    fn position_of(&self, id: ClipId) -> TileSyncResult<usize> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.clip.id)
            .map_err(|_| TileSyncError::not_found(id.index()))
    }
}

impl fmt::Debug for ClipRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipRegistry")
            .field("backend", &self.backend.name())
            .field("entries", &self.entries)
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::{EngineCommand, ScriptedBackend, ScriptedMedia};
    use crate::events::EventQueue;

    fn registry_with(locators: &[&str]) -> (ClipRegistry, ScriptedBackend, EventQueue) {
        let mut backend = ScriptedBackend::new();
        for locator in locators {
            backend = backend.with_media(*locator, ScriptedMedia::default());
        }
        let queue = EventQueue::new();
        let registry = ClipRegistry::new(Box::new(backend.clone()), queue.sender());
        (registry, backend, queue)
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let (mut registry, _, _queue) = registry_with(&["a.mp4", "b.mp4", "c.mp4"]);
        assert_eq!(registry.add("a.mp4").unwrap(), ClipId(0));
        assert_eq!(registry.add("b.mp4").unwrap(), ClipId(1));
        assert_eq!(registry.add("c.mp4").unwrap(), ClipId(2));
        assert_eq!(registry.ids(), vec![ClipId(0), ClipId(1), ClipId(2)]);
        assert_eq!(registry.get(ClipId(1)).unwrap().display_name(), "b.mp4");
    }

    #[test]
    fn test_failed_open_consumes_no_id() {
        let (mut registry, _, _queue) = registry_with(&["a.mp4"]);
        let err = registry.add("missing.mp4").unwrap_err();
        assert!(matches!(err, TileSyncError::InvalidSource { .. }));
        assert!(registry.is_empty());
        assert_eq!(registry.add("a.mp4").unwrap(), ClipId(0));
    }

    #[test]
    fn test_remove_keeps_survivor_ids() {
        let (mut registry, backend, _queue) = registry_with(&["a.mp4", "b.mp4", "c.mp4"]);
        for locator in ["a.mp4", "b.mp4", "c.mp4"] {
            registry.add(locator).unwrap();
        }

        let removed = registry.remove(ClipId(1)).unwrap();
        assert_eq!(removed.id, ClipId(1));
        assert_eq!(registry.ids(), vec![ClipId(0), ClipId(2)]);
        assert!(registry.get(ClipId(2)).is_some());
        assert_eq!(
            backend.commands_for(ClipId(1)),
            vec![EngineCommand::Stop]
        );

        // Ids are never reused.
        registry.add("b.mp4").unwrap();
        assert_eq!(registry.ids(), vec![ClipId(0), ClipId(2), ClipId(3)]);
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let (mut registry, _, _queue) = registry_with(&[]);
        let err = registry.remove(ClipId(7)).unwrap_err();
        assert!(matches!(err, TileSyncError::NotFound { index: 7 }));
    }

    #[test]
    fn test_reports_are_idempotent_upserts() {
        let (mut registry, _, _queue) = registry_with(&["a.mp4"]);
        let id = registry.add("a.mp4").unwrap();

        registry.report_aspect_ratio(id, AspectRatio::new(4, 3).unwrap()).unwrap();
        registry.report_duration(id, 5_000).unwrap();
        registry.report_duration(id, 5_000).unwrap();
        registry.report_aspect_ratio(id, AspectRatio::new(16, 9).unwrap()).unwrap();

        let clip = registry.get(id).unwrap();
        assert_eq!(clip.duration_ms, Some(5_000));
        assert_eq!(clip.aspect, AspectRatio::new(16, 9));
        assert!(clip.is_probed());

        let err = registry.report_duration(ClipId(9), 1).unwrap_err();
        assert!(matches!(err, TileSyncError::NotFound { index: 9 }));
    }

    #[test]
    fn test_max_known_duration() {
        let (mut registry, _, _queue) = registry_with(&["a.mp4", "b.mp4", "c.mp4"]);
        let a = registry.add("a.mp4").unwrap();
        let b = registry.add("b.mp4").unwrap();
        registry.add("c.mp4").unwrap();
        assert_eq!(registry.max_known_duration(), 0);

        registry.report_duration(a, 10_000).unwrap();
        registry.report_duration(b, 30_000).unwrap();
        assert_eq!(registry.max_known_duration(), 30_000);

        registry.remove(b).unwrap();
        assert_eq!(registry.max_known_duration(), 10_000);
    }

    #[test]
    fn test_fan_out_visits_every_clip_and_returns_first_error() {
        let (mut registry, _, _queue) = registry_with(&["a.mp4", "b.mp4", "c.mp4"]);
        for locator in ["a.mp4", "b.mp4", "c.mp4"] {
            registry.add(locator).unwrap();
        }

        let mut visited = Vec::new();
        let result = registry.fan_out(|clip, _engine| {
            visited.push(clip.id);
            if clip.id.index() >= 1 {
                return Err(TileSyncError::playback(format!("boom {}", clip.id)));
            }
            Ok(())
        });

        assert_eq!(visited, vec![ClipId(0), ClipId(1), ClipId(2)]);
        match result {
            Err(TileSyncError::Playback { message }) => assert_eq!(message, "boom 1"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
