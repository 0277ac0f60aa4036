//! Integration tests for the playback session
//!
//! These drive a spawned session through its handle, with scripted renderer
//! and focus collaborators standing in for the platform.

use crate::test_utils::{track, tracks, Harness, ScriptedRendererFactory};
use r_mymusic::focus::{FocusChange, FocusGrant};
use r_mymusic::queue::Queue;
use r_mymusic::session::{FocusState, PlayState, Progress, SessionConfig, SessionError, SessionEvent};
use std::time::Duration;

#[cfg(test)]
mod session_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_select_track_loads_then_plays_when_ready() {
        let mut h = Harness::start();
        h.handle.replace_queue(Queue::new(tracks(&["a", "b", "c"]))).await.unwrap();
        h.handle.select_track(track("b")).await.unwrap();

        let loading = h.expect_state(PlayState::Loading).await;
        assert_eq!(loading, Some(track("b")));
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Loading);
        assert_eq!(snapshot.focus_state, FocusState::Granted);
        assert_eq!(snapshot.current_index, Some(1));
        assert_eq!(h.renderers.record(0).locator.as_deref(), Some("/music/b.mp3"));
        assert_eq!(h.renderers.record(0).starts, 0);

        h.renderers.emit_ready(0);
        assert_eq!(h.expect_state(PlayState::Playing).await, Some(track("b")));
        assert_eq!(h.renderers.record(0).starts, 1);
        let now_playing = h.sink.last().unwrap();
        assert_eq!(now_playing.track, track("b"));
        assert!(now_playing.is_playing);
    }

    #[tokio::test]
    async fn test_selecting_unknown_track_is_ignored() {
        let h = Harness::start();
        h.handle.replace_queue(Queue::new(tracks(&["a"]))).await.unwrap();
        h.handle.select_track(track("zzz")).await.unwrap();

        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Idle);
        assert_eq!(h.renderers.created(), 0);
        assert_eq!(h.focus.requests(), 0);
    }

    #[tokio::test]
    async fn test_events_from_superseded_renderer_are_dropped() {
        let mut h = Harness::start();
        h.handle.replace_queue(Queue::new(tracks(&["a", "b", "c"]))).await.unwrap();
        h.handle.play_at(0).await.unwrap();
        h.handle.play_at(1).await.unwrap();
        let _ = h.handle.snapshot().await.unwrap();
        assert!(h.renderers.record(0).released);
        assert!(!h.renderers.record(1).released);

        // A late completion from the first renderer must not advance the queue.
        h.renderers.emit_completed(0);
        h.renderers.emit_ready(1);
        assert_eq!(h.expect_state(PlayState::Playing).await, Some(track("b")));

        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(h.renderers.created(), 2);
        assert_eq!(snapshot.current_index, Some(1));
        assert_eq!(h.renderers.record(0).starts, 0);
    }

    #[tokio::test]
    async fn test_focus_is_requested_once_per_grant() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a", "b"]), 0).await;
        h.handle.next().await.unwrap();
        h.handle.next().await.unwrap();
        let _ = h.handle.snapshot().await.unwrap();
        assert_eq!(h.focus.requests(), 1);
    }

    #[tokio::test]
    async fn test_next_and_previous_wrap_around() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a", "b", "c"]), 2).await;

        h.handle.next().await.unwrap();
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.current_index, Some(0));
        assert_eq!(snapshot.active_track, Some(track("a")));
        assert_eq!(snapshot.play_state, PlayState::Loading);

        h.handle.previous().await.unwrap();
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.current_index, Some(2));
        assert_eq!(snapshot.active_track, Some(track("c")));
    }

    #[tokio::test]
    async fn test_next_on_empty_queue_does_nothing() {
        let h = Harness::start();
        h.handle.next().await.unwrap();
        h.handle.previous().await.unwrap();
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Idle);
        assert_eq!(snapshot.current_index, None);
        assert_eq!(h.renderers.created(), 0);
    }

    #[tokio::test]
    async fn test_completion_advances_to_next_track() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a", "b"]), 0).await;

        h.renderers.emit_completed(0);
        assert_eq!(h.expect_state(PlayState::Loading).await, Some(track("b")));
        assert!(h.renderers.record(0).released);

        h.renderers.emit_completed(1);
        // Last track wraps to the first.
        assert_eq!(h.expect_state(PlayState::Loading).await, Some(track("a")));
        assert_eq!(h.renderers.created(), 3);
    }

    #[tokio::test]
    async fn test_completion_with_emptied_queue_stops() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a"]), 0).await;
        h.handle.replace_queue(Queue::empty()).await.unwrap();

        h.renderers.emit_completed(0);
        assert_eq!(h.expect_state(PlayState::Stopped).await, None);
        assert!(h.renderers.record(0).released);
    }

    #[tokio::test]
    async fn test_replace_queue_keeps_current_playback() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a", "b"]), 0).await;
        h.handle.replace_queue(Queue::new(tracks(&["x", "y", "z"]))).await.unwrap();

        let event = h.expect_event(|e| matches!(e, SessionEvent::QueueChanged { len: 3, .. })).await;
        assert_eq!(event, SessionEvent::QueueChanged { len: 3, current_index: Some(0) });
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Playing);
        assert_eq!(snapshot.active_track, Some(track("a")));
        assert!(!h.renderers.record(0).released);
    }

    #[tokio::test]
    async fn test_focus_denied_leaves_session_idle() {
        let mut h = Harness::start();
        h.focus.deny_requests(true);
        h.handle.replace_queue(Queue::new(tracks(&["a"]))).await.unwrap();
        h.handle.play_at(0).await.unwrap();

        let event = h.expect_event(|e| matches!(e, SessionEvent::Error(_))).await;
        assert_eq!(event, SessionEvent::Error(SessionError::FocusDenied));
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Idle);
        assert_eq!(snapshot.focus_state, FocusState::None);
        assert_eq!(snapshot.active_track, None);
        assert_eq!(h.renderers.created(), 0);

        // Denial is not sticky.
        h.focus.deny_requests(false);
        h.handle.play_at(0).await.unwrap();
        assert_eq!(h.expect_state(PlayState::Loading).await, Some(track("a")));
        assert_eq!(h.focus.requests(), 2);
    }

    #[tokio::test]
    async fn test_duck_lowers_and_regain_restores_level() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a"]), 0).await;

        h.focus.notify(FocusChange::duck());
        h.expect_event(|e| *e == SessionEvent::FocusChanged(FocusState::Ducked)).await;
        assert_eq!(h.renderers.record(0).levels.last().copied(), Some(0.2));
        assert_eq!(h.handle.snapshot().await.unwrap().play_state, PlayState::Playing);

        h.focus.notify(FocusChange::Regained);
        h.expect_event(|e| *e == SessionEvent::FocusChanged(FocusState::Granted)).await;
        assert_eq!(h.renderers.record(0).levels.last().copied(), Some(1.0));
        assert_eq!(h.renderers.record(0).pauses, 0);
    }

    #[tokio::test]
    async fn test_track_started_while_ducked_starts_quiet() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a", "b"]), 0).await;
        h.focus.notify(FocusChange::duck());
        h.expect_event(|e| *e == SessionEvent::FocusChanged(FocusState::Ducked)).await;

        h.handle.next().await.unwrap();
        h.expect_state(PlayState::Loading).await;
        assert_eq!(h.renderers.record(1).levels, vec![0.2]);
    }

    #[tokio::test]
    async fn test_transient_loss_pauses_and_regain_resumes() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a"]), 0).await;

        h.focus.notify(FocusChange::transient());
        h.expect_state(PlayState::Paused).await;
        assert_eq!(h.renderers.record(0).pauses, 1);
        assert_eq!(h.handle.snapshot().await.unwrap().focus_state, FocusState::Lost);
        assert!(!h.sink.last().unwrap().is_playing);

        h.focus.notify(FocusChange::Regained);
        h.expect_state(PlayState::Playing).await;
        assert_eq!(h.renderers.record(0).starts, 2);
    }

    #[tokio::test]
    async fn test_regain_does_not_resume_user_pause() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a"]), 0).await;
        h.handle.toggle_play_pause().await.unwrap();
        h.expect_state(PlayState::Paused).await;

        h.focus.notify(FocusChange::transient());
        h.expect_event(|e| *e == SessionEvent::FocusChanged(FocusState::Lost)).await;
        h.focus.notify(FocusChange::Regained);
        h.expect_event(|e| *e == SessionEvent::FocusChanged(FocusState::Granted)).await;

        assert_eq!(h.handle.snapshot().await.unwrap().play_state, PlayState::Paused);
        assert_eq!(h.renderers.record(0).starts, 1);
    }

    #[tokio::test]
    async fn test_transient_loss_while_loading_holds_track_paused() {
        let mut h = Harness::start();
        h.handle.replace_queue(Queue::new(tracks(&["a"]))).await.unwrap();
        h.handle.play_at(0).await.unwrap();
        h.expect_state(PlayState::Loading).await;

        h.focus.notify(FocusChange::transient());
        h.expect_event(|e| *e == SessionEvent::FocusChanged(FocusState::Lost)).await;
        h.renderers.emit_ready(0);
        h.expect_state(PlayState::Paused).await;
        assert_eq!(h.renderers.record(0).starts, 0);

        h.focus.notify(FocusChange::Regained);
        h.expect_state(PlayState::Playing).await;
    }

    #[tokio::test]
    async fn test_permanent_loss_terminates_session() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a"]), 0).await;

        h.focus.notify(FocusChange::permanent());
        h.expect_event(|e| *e == SessionEvent::Terminated).await;
        tokio::time::timeout(Duration::from_secs(2), &mut h.task).await.unwrap().unwrap();

        assert!(h.renderers.record(0).released);
        assert_eq!(h.sink.clears(), 1);
        assert_eq!(h.focus.released(), vec![FocusGrant::new(1)]);
        assert!(h.handle.is_closed());
        assert_eq!(h.handle.play_at(0).await, Err(SessionError::Closed));
    }

    #[tokio::test]
    async fn test_seek_is_clamped_to_duration() {
        let renderers = ScriptedRendererFactory::new().with_duration(60_000);
        let mut h = Harness::with(renderers, SessionConfig::default());
        h.play_ready(tracks(&["a"]), 0).await;

        h.handle.seek_to(90_000).await.unwrap();
        let event = h.expect_event(|e| matches!(e, SessionEvent::Seeked { .. })).await;
        assert_eq!(event, SessionEvent::Seeked { position_millis: 60_000 });

        h.handle.seek_to(15_000).await.unwrap();
        let progress = h.handle.progress().await;
        assert_eq!(progress, Progress { position_millis: 15_000, duration_millis: 60_000 });
        assert_eq!(h.renderers.record(0).seeks, vec![60_000, 15_000]);
    }

    #[tokio::test]
    async fn test_seek_and_progress_without_track() {
        let h = Harness::start();
        h.handle.seek_to(5_000).await.unwrap();
        assert_eq!(h.handle.progress().await, Progress::default());
        assert_eq!(h.renderers.created(), 0);
    }

    #[tokio::test]
    async fn test_toggle_is_ignored_while_idle() {
        let h = Harness::start();
        h.handle.replace_queue(Queue::new(tracks(&["a", "b"]))).await.unwrap();
        h.handle.toggle_play_pause().await.unwrap();

        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Idle);
        assert_eq!(snapshot.active_track, None);
        assert_eq!(h.renderers.created(), 0);
        assert_eq!(h.focus.requests(), 0);
        assert!(h.sink.last().is_none());
    }

    #[tokio::test]
    async fn test_toggle_is_ignored_while_stopped() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a", "b"]), 0).await;
        h.handle.stop().await.unwrap();
        assert_eq!(h.handle.snapshot().await.unwrap().play_state, PlayState::Stopped);
        let updates_before = h.sink.update_count();

        h.handle.toggle_play_pause().await.unwrap();
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Stopped);
        assert_eq!(snapshot.active_track, None);
        assert_eq!(h.renderers.created(), 1);
        assert_eq!(h.renderers.record(0).starts, 1);
        assert_eq!(h.sink.update_count(), updates_before);
    }

    #[tokio::test]
    async fn test_track_change_during_transient_loss_stays_paused() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a", "b"]), 0).await;
        h.focus.notify(FocusChange::transient());
        h.expect_state(PlayState::Paused).await;

        h.handle.next().await.unwrap();
        assert_eq!(h.expect_state(PlayState::Loading).await, Some(track("b")));
        h.renderers.emit_ready(1);
        assert_eq!(h.expect_state(PlayState::Paused).await, Some(track("b")));
        assert_eq!(h.renderers.record(1).starts, 0);
        assert_eq!(h.focus.requests(), 1);

        h.focus.notify(FocusChange::Regained);
        assert_eq!(h.expect_state(PlayState::Playing).await, Some(track("b")));
        assert_eq!(h.renderers.record(1).starts, 1);
    }

    #[tokio::test]
    async fn test_toggle_is_ignored_while_loading() {
        let mut h = Harness::start();
        h.handle.replace_queue(Queue::new(tracks(&["a"]))).await.unwrap();
        h.handle.play_at(0).await.unwrap();
        h.handle.toggle_play_pause().await.unwrap();

        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Loading);
        assert_eq!(h.renderers.record(0).pauses, 0);

        h.renderers.emit_ready(0);
        h.expect_state(PlayState::Playing).await;
        h.handle.toggle_play_pause().await.unwrap();
        assert_eq!(h.handle.snapshot().await.unwrap().play_state, PlayState::Paused);
        h.handle.toggle_play_pause().await.unwrap();
        assert_eq!(h.handle.snapshot().await.unwrap().play_state, PlayState::Playing);
        assert_eq!(h.renderers.record(0).starts, 2);
    }

    #[tokio::test]
    async fn test_bind_failure_reports_error() {
        let mut h = Harness::start();
        h.renderers.fail_bind_for("/music/b.mp3");
        h.handle.replace_queue(Queue::new(tracks(&["a", "b"]))).await.unwrap();
        h.handle.play_at(1).await.unwrap();

        let event = h.expect_event(|e| matches!(e, SessionEvent::Error(_))).await;
        assert!(matches!(
            event,
            SessionEvent::Error(SessionError::RendererBind { ref track_id, .. }) if track_id == "b"
        ));
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Idle);
        assert_eq!(snapshot.active_track, None);
        assert!(h.renderers.record(0).released);
    }

    #[tokio::test]
    async fn test_async_load_failure_reports_bind_error() {
        let mut h = Harness::start();
        h.handle.replace_queue(Queue::new(tracks(&["a"]))).await.unwrap();
        h.handle.play_at(0).await.unwrap();
        h.expect_state(PlayState::Loading).await;

        h.renderers.emit_failed(0, "no such file");
        let event = h.expect_event(|e| matches!(e, SessionEvent::Error(_))).await;
        assert_eq!(
            event,
            SessionEvent::Error(SessionError::RendererBind {
                track_id: "a".to_string(),
                message: "no such file".to_string()
            })
        );
        assert_eq!(h.handle.snapshot().await.unwrap().play_state, PlayState::Idle);
    }

    #[tokio::test]
    async fn test_runtime_failure_reports_runtime_error() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a"]), 0).await;

        h.renderers.emit_failed(0, "device unplugged");
        let event = h.expect_event(|e| matches!(e, SessionEvent::Error(_))).await;
        assert!(matches!(event, SessionEvent::Error(SessionError::RendererRuntime { .. })));
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Idle);
        assert!(h.renderers.record(0).released);
    }

    #[tokio::test]
    async fn test_stop_releases_renderer_but_keeps_focus() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a"]), 0).await;

        h.handle.stop().await.unwrap();
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.play_state, PlayState::Stopped);
        assert_eq!(snapshot.focus_state, FocusState::Granted);
        assert_eq!(snapshot.active_track, None);
        assert_eq!(snapshot.queue_len, 1);
        assert!(h.renderers.record(0).released);
        assert!(!h.sink.last().unwrap().is_playing);
        assert_eq!(h.focus.releases(), 0);
    }

    #[tokio::test]
    async fn test_teardown_releases_everything_once() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a"]), 0).await;

        h.handle.teardown().await.unwrap();
        h.expect_event(|e| *e == SessionEvent::Terminated).await;
        tokio::time::timeout(Duration::from_secs(2), &mut h.task).await.unwrap().unwrap();

        assert!(h.renderers.record(0).released);
        assert_eq!(h.focus.releases(), 1);
        assert_eq!(h.sink.clears(), 1);

        h.handle.teardown().await.unwrap();
        assert_eq!(h.focus.releases(), 1);
        assert_eq!(h.handle.snapshot().await, Err(SessionError::Closed));
    }

    #[tokio::test]
    async fn test_dropping_all_handles_tears_down() {
        let mut h = Harness::start();
        h.play_ready(tracks(&["a"]), 0).await;

        let Harness { handle, task, renderers, focus, sink, .. } = h;
        drop(handle);
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

        assert!(renderers.record(0).released);
        assert_eq!(focus.releases(), 1);
        assert_eq!(sink.clears(), 1);
    }

    #[tokio::test]
    async fn test_attach_polls_progress_until_detached() {
        let config = SessionConfig { progress_interval: Duration::from_millis(10), ..SessionConfig::default() };
        let renderers = ScriptedRendererFactory::new().with_duration(60_000);
        let mut h = Harness::with(renderers, config);
        h.play_ready(tracks(&["a"]), 0).await;
        h.handle.seek_to(5_000).await.unwrap();

        let mut attachment = h.handle.attach();
        assert!(attachment.is_polling());
        let mut progress = attachment.progress();
        let expected = Progress { position_millis: 5_000, duration_millis: 60_000 };
        let polled = async {
            while *progress.borrow_and_update() != expected {
                progress.changed().await.unwrap();
            }
        };
        tokio::time::timeout(Duration::from_secs(2), polled).await.unwrap();
        assert_eq!(attachment.latest_progress(), expected);

        attachment.detach();
        assert!(!attachment.is_polling());
        attachment.detach();
    }
}
