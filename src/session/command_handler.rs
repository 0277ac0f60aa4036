// src/session/command_handler.rs
use super::state::InternalEvent;
use super::{FocusState, PlayState, PlaybackSession, SessionError, SessionEvent, LOG_TARGET};
use crate::audio::{Generation, RendererEvent, RendererEvents};
use crate::catalog::Track;
use crate::focus::{FocusChange, FocusListener, FocusRequestResult};
use crate::queue::Queue;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

const FULL_OUTPUT_LEVEL: f32 = 1.0;

/// Installs a new queue. Current playback is left alone.
#[instrument(skip(session, queue), fields(len = queue.len()))]
pub(super) fn handle_replace_queue(session: &mut PlaybackSession, queue: Queue) {
    info!(target: LOG_TARGET, "Replacing queue with {} tracks.", queue.len());
    session.queue = queue;
    broadcast_queue(session);
}

#[instrument(skip(session, track), fields(track_id = %track.id))]
pub(super) async fn handle_select_track(session: &mut PlaybackSession, track: Track) {
    let Some(index) = session.queue.index_of(&track) else {
        warn!(target: LOG_TARGET, "Selected track is not in the queue, ignoring.");
        return;
    };
    start_track(session, track, Some(index)).await;
}

#[instrument(skip(session))]
pub(super) async fn handle_play_at(session: &mut PlaybackSession, index: usize) {
    let Some(track) = session.queue.get(index).cloned() else {
        warn!(target: LOG_TARGET, len = session.queue.len(), "Queue index out of range, ignoring.");
        return;
    };
    start_track(session, track, Some(index)).await;
}

#[instrument(skip(session), fields(state = %session.play_state))]
pub(super) async fn handle_toggle_play_pause(session: &mut PlaybackSession) {
    match session.play_state {
        PlayState::Playing => pause_active(session),
        PlayState::Paused => {
            session.paused_by_focus_loss = false;
            if !ensure_focus(session).await {
                session.broadcast(SessionEvent::Error(SessionError::FocusDenied));
                return;
            }
            resume_active(session);
        }
        other => debug!(target: LOG_TARGET, "Play/pause ignored in state {}.", other),
    }
}

#[instrument(skip(session))]
pub(super) async fn handle_next(session: &mut PlaybackSession) {
    let Some(track) = session.queue.next().cloned() else {
        debug!(target: LOG_TARGET, "Queue empty, next ignored.");
        return;
    };
    broadcast_queue(session);
    start_track(session, track, None).await;
}

#[instrument(skip(session))]
pub(super) async fn handle_previous(session: &mut PlaybackSession) {
    let Some(track) = session.queue.previous().cloned() else {
        debug!(target: LOG_TARGET, "Queue empty, previous ignored.");
        return;
    };
    broadcast_queue(session);
    start_track(session, track, None).await;
}

/// Seeks within the active track, clamped to its duration when known.
#[instrument(skip(session))]
pub(super) fn handle_seek(session: &mut PlaybackSession, position_millis: u64) {
    if !matches!(session.play_state, PlayState::Loading | PlayState::Playing | PlayState::Paused) {
        debug!(target: LOG_TARGET, "Seek ignored in state {}.", session.play_state);
        return;
    }
    let known_duration = session
        .renderer
        .duration()
        .or_else(|| session.active_track.as_ref().map(|t| t.duration_millis).filter(|d| *d > 0));
    let target = known_duration.map_or(position_millis, |d| position_millis.min(d));

    let Some(renderer) = session.renderer.renderer_mut() else {
        return;
    };
    match renderer.seek(target) {
        Ok(()) => {
            debug!(target: LOG_TARGET, "Seek to {} ms requested.", target);
            session.broadcast(SessionEvent::Seeked { position_millis: target });
        }
        Err(e) => warn!(target: LOG_TARGET, "Seek failed: {}", e),
    }
}

/// Releases the renderer but keeps focus and the queue.
#[instrument(skip(session))]
pub(super) fn handle_stop(session: &mut PlaybackSession) {
    if !session.renderer.is_loaded() {
        debug!(target: LOG_TARGET, "Nothing loaded, stop ignored.");
        return;
    }
    session.renderer.release();
    session.paused_by_focus_loss = false;
    session.push_now_playing(false);
    session.active_track = None;
    session.set_play_state(PlayState::Stopped);
}

pub(super) async fn handle_teardown(session: &mut PlaybackSession, ack: Option<oneshot::Sender<()>>) {
    terminate(session).await;
    if let Some(ack) = ack {
        let _ = ack.send(());
    }
}

pub(super) async fn handle_renderer_event(session: &mut PlaybackSession, generation: Generation, event: RendererEvent) {
    if !session.renderer.is_current(generation) {
        debug!(target: LOG_TARGET, generation, ?event, "Dropping event from superseded renderer.");
        return;
    }
    match event {
        RendererEvent::Ready => on_renderer_ready(session),
        RendererEvent::Completed => on_renderer_completed(session).await,
        RendererEvent::Failed(message) => fail_active_track(session, message),
    }
}

#[instrument(skip(session))]
pub(super) async fn handle_focus_change(session: &mut PlaybackSession, grant: u64, change: FocusChange) {
    if grant != session.focus_grant || !session.focus_state.is_held() {
        debug!(target: LOG_TARGET, "Dropping focus change for a stale grant.");
        return;
    }
    match change {
        FocusChange::Lost { transient: false, .. } => {
            info!(target: LOG_TARGET, "Focus lost permanently, terminating session.");
            terminate(session).await;
        }
        FocusChange::Lost { duckable: true, .. } => {
            session.set_focus_state(FocusState::Ducked);
            let level = session.config.duck_level;
            if let Some(renderer) = session.renderer.renderer_mut() {
                renderer.set_output_level(level);
            }
        }
        FocusChange::Lost { .. } => {
            session.set_focus_state(FocusState::Lost);
            match session.play_state {
                PlayState::Playing => {
                    pause_active(session);
                    session.paused_by_focus_loss = session.play_state == PlayState::Paused;
                }
                PlayState::Loading => session.paused_by_focus_loss = true,
                _ => {}
            }
        }
        FocusChange::Regained => {
            session.set_focus_state(FocusState::Granted);
            if let Some(renderer) = session.renderer.renderer_mut() {
                renderer.set_output_level(FULL_OUTPUT_LEVEL);
            }
            if std::mem::take(&mut session.paused_by_focus_loss) && session.play_state == PlayState::Paused {
                resume_active(session);
            }
        }
    }
}

/// Loads `track` on a fresh renderer, superseding whatever was loaded before.
///
/// During a transient loss the new track is held paused until focus returns.
async fn start_track(session: &mut PlaybackSession, track: Track, cursor: Option<usize>) {
    session.renderer.release();
    session.paused_by_focus_loss = session.focus_state == FocusState::Lost;

    if !ensure_focus(session).await {
        warn!(target: LOG_TARGET, track_id = %track.id, "Focus denied, not starting playback.");
        session.active_track = None;
        session.set_play_state(PlayState::Idle);
        session.broadcast(SessionEvent::Error(SessionError::FocusDenied));
        return;
    }

    if let Some(index) = cursor {
        match session.queue.jump_to_index(index) {
            Ok(_) => broadcast_queue(session),
            Err(e) => warn!(target: LOG_TARGET, "Cursor not moved: {}", e),
        }
    }

    let generation = session.renderer.next_generation();
    let mut renderer = session.renderer_factory.create();
    if session.focus_state == FocusState::Ducked {
        renderer.set_output_level(session.config.duck_level);
    }
    let internal_tx = session.internal_tx.clone();
    let events = RendererEvents::new(generation, move |generation, event| {
        let _ = internal_tx.send(InternalEvent::Renderer { generation, event });
    });

    match renderer.bind(&track.source_locator, events) {
        Ok(()) => {
            info!(target: LOG_TARGET, generation, track_id = %track.id, "Loading track.");
            session.renderer.install(generation, &track.id, renderer);
            session.active_track = Some(track);
            session.announce_play_state(PlayState::Loading);
            session.push_now_playing(false);
        }
        Err(e) => {
            warn!(target: LOG_TARGET, track_id = %track.id, "Renderer bind failed: {}", e);
            renderer.release();
            session.active_track = None;
            session.set_play_state(PlayState::Idle);
            session.broadcast(SessionEvent::Error(SessionError::RendererBind {
                track_id: track.id,
                message: e.to_string(),
            }));
        }
    }
}

/// Requests focus unless a grant is already held. Returns whether playback may proceed.
async fn ensure_focus(session: &mut PlaybackSession) -> bool {
    if session.focus_state.is_held() {
        return true;
    }
    session.focus_grant += 1;
    let grant = session.focus_grant;
    session.set_focus_state(FocusState::Requested);

    let internal_tx = session.internal_tx.clone();
    let listener: FocusListener = Box::new(move |change| {
        let _ = internal_tx.send(InternalEvent::Focus { grant, change });
    });
    let arbiter = Arc::clone(&session.focus_arbiter);
    match arbiter.request(listener).await {
        FocusRequestResult::Granted(token) => {
            session.focus_token = Some(token);
            session.set_focus_state(FocusState::Granted);
            true
        }
        FocusRequestResult::Denied => {
            session.set_focus_state(FocusState::None);
            false
        }
    }
}

fn on_renderer_ready(session: &mut PlaybackSession) {
    if session.play_state != PlayState::Loading {
        debug!(target: LOG_TARGET, "Ready ignored in state {}.", session.play_state);
        return;
    }
    if session.paused_by_focus_loss {
        info!(target: LOG_TARGET, "Track ready while focus is lost, holding paused.");
        session.set_play_state(PlayState::Paused);
        return;
    }
    resume_active(session);
}

async fn on_renderer_completed(session: &mut PlaybackSession) {
    info!(target: LOG_TARGET, "Track completed, advancing.");
    if session.queue.is_empty() {
        session.renderer.release();
        session.push_now_playing(false);
        session.active_track = None;
        session.set_play_state(PlayState::Stopped);
        return;
    }
    handle_next(session).await;
}

fn pause_active(session: &mut PlaybackSession) {
    let Some(renderer) = session.renderer.renderer_mut() else {
        return;
    };
    match renderer.pause() {
        Ok(()) => {
            session.set_play_state(PlayState::Paused);
            session.push_now_playing(false);
        }
        Err(e) => fail_active_track(session, e.to_string()),
    }
}

fn resume_active(session: &mut PlaybackSession) {
    let Some(renderer) = session.renderer.renderer_mut() else {
        return;
    };
    match renderer.start() {
        Ok(()) => {
            session.set_play_state(PlayState::Playing);
            session.push_now_playing(true);
        }
        Err(e) => fail_active_track(session, e.to_string()),
    }
}

/// Abandons the active track after a renderer failure and returns to idle.
fn fail_active_track(session: &mut PlaybackSession, message: String) {
    let track_id = session.active_track.as_ref().map(|t| t.id.clone()).unwrap_or_default();
    warn!(target: LOG_TARGET, %track_id, "Renderer failed: {}", message);
    let error = if session.play_state == PlayState::Loading {
        SessionError::RendererBind { track_id, message }
    } else {
        SessionError::RendererRuntime { track_id, message }
    };
    session.renderer.release();
    session.paused_by_focus_loss = false;
    session.active_track = None;
    session.set_play_state(PlayState::Idle);
    session.broadcast(SessionEvent::Error(error));
}

/// Releases everything and marks the session finished.
async fn terminate(session: &mut PlaybackSession) {
    if session.terminated {
        return;
    }
    session.renderer.release();
    if let Some(token) = session.focus_token.take() {
        let arbiter = Arc::clone(&session.focus_arbiter);
        arbiter.release(token).await;
    }
    // Invalidate the listener of the old grant.
    session.focus_grant += 1;
    session.set_focus_state(FocusState::None);
    session.paused_by_focus_loss = false;
    session.active_track = None;
    session.now_playing.clear();
    session.set_play_state(PlayState::Idle);
    session.terminated = true;
    session.broadcast(SessionEvent::Terminated);
    info!(target: LOG_TARGET, "Session terminated.");
}

fn broadcast_queue(session: &PlaybackSession) {
    session.broadcast(SessionEvent::QueueChanged {
        len: session.queue.len(),
        current_index: session.queue.current_index(),
    });
}
