//! Inbound event queue.
//!
//! Engines run on their own threads (or none at all) and never touch
//! session state. They push [`PlaybackEvent`]s here; the owner drains the
//! queue and applies events one at a time, so session fields have a
//! single writer.

use tokio::sync::mpsc;

use tilesync_clip_model::PlaybackEvent;

use crate::engine::EventSender;

/// Unbounded FIFO of playback events with a cloneable sending half.
#[derive(Debug)]
pub struct EventQueue {
    tx: EventSender,
    rx: mpsc::UnboundedReceiver<PlaybackEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A sender for a new engine.
    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    /// Pop the next queued event without waiting.
    pub fn try_next(&mut self) -> Option<PlaybackEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event.
    ///
    /// The queue holds a sender itself, so this only returns `None` if the
    /// runtime is shutting the channel down.
    pub async fn next(&mut self) -> Option<PlaybackEvent> {
        self.rx.recv().await
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilesync_clip_model::ClipId;

    #[test]
    fn test_events_preserve_arrival_order() {
        let mut queue = EventQueue::new();
        let a = queue.sender();
        let b = queue.sender();

        a.send(PlaybackEvent::duration(ClipId(0), 1_000)).unwrap();
        b.send(PlaybackEvent::position(ClipId(1), 20)).unwrap();
        a.send(PlaybackEvent::position(ClipId(0), 10)).unwrap();

        assert_eq!(queue.try_next(), Some(PlaybackEvent::duration(ClipId(0), 1_000)));
        assert_eq!(queue.try_next(), Some(PlaybackEvent::position(ClipId(1), 20)));
        assert_eq!(queue.try_next(), Some(PlaybackEvent::position(ClipId(0), 10)));
        assert_eq!(queue.try_next(), None);
    }

    #[tokio::test]
    async fn test_next_waits_for_sender_thread() {
        let mut queue = EventQueue::new();
        let tx = queue.sender();
        std::thread::spawn(move || {
            tx.send(PlaybackEvent::duration(ClipId(3), 42)).unwrap();
        });
        let event = queue.next().await;
        assert_eq!(event, Some(PlaybackEvent::duration(ClipId(3), 42)));
    }
}
