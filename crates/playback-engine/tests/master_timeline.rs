use proptest::prelude::*;
use tilesync_clip_model::{ClipId, PlaybackEvent, TransportState};
use tilesync_playback_engine::backend::{EngineCommand, ScriptedBackend, ScriptedMedia};
use tilesync_playback_engine::{proportional_target, SessionConfig, SyncController};

fn session(durations: &[Option<u64>]) -> (SyncController, ScriptedBackend, Vec<ClipId>) {
    let mut backend = ScriptedBackend::new();
    for (i, duration) in durations.iter().enumerate() {
        let media = match duration {
            Some(ms) => ScriptedMedia::new(*ms, 1280, 720),
            None => ScriptedMedia::unprobed(),
        };
        backend = backend.with_media(format!("clip{i}.mp4"), media);
    }

    let config = SessionConfig {
        max_clips: None,
        ..SessionConfig::default()
    };
    let mut controller = SyncController::new(Box::new(backend.clone()), config).unwrap();
    let ids = (0..durations.len())
        .map(|i| controller.add_clip(format!("clip{i}.mp4")).unwrap())
        .collect();
    controller.pump();
    backend.clear_commands();
    (controller, backend, ids)
}

proptest! {
    #[test]
    fn proportional_target_stays_within_clip(
        master in 1u64..10_000_000,
        clip in 0u64..10_000_000,
        fraction in 0.0f64..=1.0,
    ) {
        let position = (master as f64 * fraction) as u64;
        let target = proportional_target(position, master, clip);
        prop_assert!(target <= clip);
        prop_assert!(proportional_target(master, master, clip) == clip);
    }

    #[test]
    fn proportional_target_is_monotonic(
        master in 1u64..1_000_000,
        clip in 0u64..1_000_000,
        a in 0u64..1_000_000,
        b in 0u64..1_000_000,
    ) {
        let (lo, hi) = (a.min(b).min(master), a.max(b).min(master));
        prop_assert!(proportional_target(lo, master, clip) <= proportional_target(hi, master, clip));
    }

    #[test]
    fn master_position_never_moves_backwards(
        reports in prop::collection::vec((0usize..3, 0.0f64..=1.0), 1..40),
    ) {
        let (mut controller, _, ids) =
            session(&[Some(120_000), Some(60_000), Some(45_000)]);
        let durations = [120_000u64, 60_000, 45_000];
        controller.play().unwrap();

        let mut last = controller.master_position_ms();
        for (clip, fraction) in reports {
            let position = (durations[clip] as f64 * fraction) as u64;
            controller
                .apply_event(PlaybackEvent::position(ids[clip], position))
                .unwrap();
            let now = controller.master_position_ms();
            prop_assert!(now >= last, "master moved back from {} to {}", last, now);
            prop_assert!(now <= controller.master_duration_ms());
            last = now;
        }
    }
}

#[test]
fn seek_starts_a_new_frame_of_reference() {
    let (mut controller, _, ids) = session(&[Some(120_000), Some(60_000)]);
    controller.play().unwrap();

    controller
        .apply_event(PlaybackEvent::position(ids[0], 90_000))
        .unwrap();
    assert_eq!(controller.master_position_ms(), 90_000);

    controller.seek_master(30_000).unwrap();
    assert_eq!(controller.master_position_ms(), 30_000);

    // Behind the seek target: stale.
    controller
        .apply_event(PlaybackEvent::position(ids[0], 20_000))
        .unwrap();
    assert_eq!(controller.master_position_ms(), 30_000);

    controller
        .apply_event(PlaybackEvent::position(ids[0], 40_000))
        .unwrap();
    assert_eq!(controller.master_position_ms(), 40_000);
    assert_eq!(controller.transport(), TransportState::Playing);
}

#[test]
fn short_clip_ending_first_leaves_master_running() {
    let (mut controller, backend, ids) = session(&[Some(20_000), Some(10_000)]);
    controller.play().unwrap();

    for position in (500..=20_000).step_by(500) {
        controller
            .apply_event(PlaybackEvent::position(ids[1], position.min(10_000)))
            .unwrap();
        controller
            .apply_event(PlaybackEvent::position(ids[0], position))
            .unwrap();
    }
    assert_eq!(controller.master_position_ms(), 20_000);

    controller.seek_master(5_000).unwrap();
    assert_eq!(backend.commands_for(ids[1]).last(), Some(&EngineCommand::Play));
    assert!(backend
        .commands_for(ids[1])
        .contains(&EngineCommand::Seek(2_500)));
}

#[test]
fn unknown_durations_are_left_alone_on_seek() {
    let (mut controller, backend, ids) = session(&[Some(10_000), Some(30_000), None]);
    assert_eq!(controller.master_duration_ms(), 30_000);

    controller.seek_master(15_000).unwrap();

    assert_eq!(backend.commands_for(ids[0]), vec![EngineCommand::Seek(5_000)]);
    assert_eq!(backend.commands_for(ids[1]), vec![EngineCommand::Seek(15_000)]);
    assert!(backend.commands_for(ids[2]).is_empty());
}

#[test]
fn removing_longest_clip_shrinks_and_clamps() {
    let (mut controller, _, ids) = session(&[Some(10_000), Some(30_000), None]);
    controller.seek_master(25_000).unwrap();

    controller.remove_clip(ids[1]).unwrap();

    assert_eq!(controller.master_duration_ms(), 10_000);
    assert_eq!(controller.master_position_ms(), 10_000);
    assert_eq!(controller.clips().count(), 2);
    assert!(controller.clip(ids[2]).is_some());
}

#[tokio::test]
async fn owner_loop_applies_events_from_other_tasks() {
    let (mut controller, _, ids) = session(&[Some(60_000)]);
    controller.play().unwrap();
    controller.pump();

    let sender = controller.event_sender();
    let clip = ids[0];
    tokio::spawn(async move {
        for position in [1_000u64, 2_000, 3_000] {
            sender.send(PlaybackEvent::position(clip, position)).unwrap();
        }
    })
    .await
    .unwrap();

    for _ in 0..3 {
        let event = controller.next_event().await.unwrap();
        controller.apply_event(event).unwrap();
    }
    assert_eq!(controller.master_position_ms(), 3_000);
}
