//! Playback session: the single owner of queue, renderer and focus state.
//!
//! Callers talk to the session through a [`SessionHandle`]. Commands, renderer
//! events and focus changes are all applied on the session task, one at a
//! time, so later commands always win over earlier ones.

use crate::audio::RendererFactory;
use crate::catalog::Track;
use crate::focus::{AudioFocusArbiter, FocusGrant};
use crate::queue::Queue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

mod command_handler;
mod handle;
mod renderer_slot;
mod run_loop;
mod state;

pub use handle::{Attachment, SessionHandle};
pub use state::{
    FocusState, NowPlaying, NowPlayingSink, PlayState, Progress, SessionCommand, SessionError, SessionEvent,
    SessionSnapshot,
};

use renderer_slot::RendererSlot;
use state::InternalEvent;

pub(crate) const LOG_TARGET: &str = "r_mymusic::session";

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub command_buffer_size: usize,
    pub event_capacity: usize,
    /// Output level applied while another source ducks us
    pub duck_level: f32,
    pub progress_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            event_capacity: 64,
            duck_level: 0.2,
            progress_interval: Duration::from_millis(1000),
        }
    }
}

/// Platform services the session depends on.
#[derive(Clone)]
pub struct SessionCollaborators {
    pub renderer_factory: Arc<dyn RendererFactory>,
    pub focus_arbiter: Arc<dyn AudioFocusArbiter>,
    pub now_playing: Arc<dyn NowPlayingSink>,
}

pub struct PlaybackSession {
    session_id: Uuid,

    // --- Collaborators ---
    renderer_factory: Arc<dyn RendererFactory>,
    focus_arbiter: Arc<dyn AudioFocusArbiter>,
    now_playing: Arc<dyn NowPlayingSink>,
    config: SessionConfig,

    // --- State ---
    queue: Queue,
    active_track: Option<Track>,
    play_state: PlayState,
    focus_state: FocusState,
    focus_grant: u64,
    focus_token: Option<FocusGrant>,
    paused_by_focus_loss: bool,
    renderer: RendererSlot,
    terminated: bool,

    // --- Communication ---
    command_rx: mpsc::Receiver<SessionCommand>,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl PlaybackSession {
    /// Creates a session and the handle that talks to it. Run the session
    /// with [`PlaybackSession::run`] on its own task.
    pub fn new(collaborators: SessionCollaborators, config: SessionConfig) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer_size.max(1));
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        let handle = SessionHandle::new(command_tx, event_tx.clone(), config.progress_interval);
        let session = PlaybackSession {
            session_id: Uuid::new_v4(),
            renderer_factory: collaborators.renderer_factory,
            focus_arbiter: collaborators.focus_arbiter,
            now_playing: collaborators.now_playing,
            config,
            queue: Queue::empty(),
            active_track: None,
            play_state: PlayState::Idle,
            focus_state: FocusState::None,
            focus_grant: 0,
            focus_token: None,
            paused_by_focus_loss: false,
            renderer: RendererSlot::default(),
            terminated: false,
            command_rx,
            internal_tx,
            internal_rx,
            event_tx,
        };
        (session, handle)
    }

    /// Creates a session and spawns it on the current runtime.
    pub fn spawn(collaborators: SessionCollaborators, config: SessionConfig) -> (SessionHandle, JoinHandle<()>) {
        let (session, handle) = Self::new(collaborators, config);
        let task = tokio::spawn(session.run());
        (handle, task)
    }

    /// Processes commands and events until torn down.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn run(mut self) {
        run_loop::run_session_loop(&mut self).await;
    }

    fn broadcast(&self, event: SessionEvent) {
        trace!(target: LOG_TARGET, "Broadcasting session event: {:?}", event);
        if self.event_tx.send(event).is_err() {
            debug!(target: LOG_TARGET, "No subscribers for session event.");
        }
    }

    fn set_play_state(&mut self, state: PlayState) {
        if self.play_state == state {
            return;
        }
        debug!(target: LOG_TARGET, from = %self.play_state, to = %state, "Play state transition.");
        self.play_state = state;
        self.broadcast(SessionEvent::StateChanged { state, track: self.active_track.clone() });
    }

    /// Like `set_play_state`, but also announces re-entering the same state
    /// with a different track.
    fn announce_play_state(&mut self, state: PlayState) {
        self.play_state = state;
        self.broadcast(SessionEvent::StateChanged { state, track: self.active_track.clone() });
    }

    fn set_focus_state(&mut self, state: FocusState) {
        if self.focus_state == state {
            return;
        }
        debug!(target: LOG_TARGET, from = ?self.focus_state, to = ?state, "Focus state transition.");
        self.focus_state = state;
        self.broadcast(SessionEvent::FocusChanged(state));
    }

    fn push_now_playing(&self, is_playing: bool) {
        if let Some(track) = &self.active_track {
            self.now_playing.update(&NowPlaying { track: track.clone(), is_playing });
        }
    }

    fn progress(&self) -> Progress {
        let track_duration = self.active_track.as_ref().map_or(0, |t| t.duration_millis);
        Progress {
            position_millis: self.renderer.position().unwrap_or(0),
            duration_millis: self.renderer.duration().unwrap_or(track_duration),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            play_state: self.play_state,
            focus_state: self.focus_state,
            active_track: self.active_track.clone(),
            queue_len: self.queue.len(),
            current_index: self.queue.current_index(),
            progress: self.progress(),
        }
    }
}
