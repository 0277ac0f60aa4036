use crate::audio::{Generation, RendererEvent};
use crate::catalog::Track;
use crate::focus::FocusChange;
use crate::queue::Queue;
use std::fmt;
use thiserror::Error;
use tokio::sync::oneshot;

/// Playback lifecycle of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
}

impl PlayState {
    pub fn is_playing(self) -> bool {
        self == PlayState::Playing
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayState::Idle => "idle",
            PlayState::Loading => "loading",
            PlayState::Playing => "playing",
            PlayState::Paused => "paused",
            PlayState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Where the session stands with the focus arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    None,
    Requested,
    Granted,
    Ducked,
    /// Transient loss; the grant is still held
    Lost,
}

impl FocusState {
    /// Whether the session may keep using its current grant.
    pub fn is_held(self) -> bool {
        matches!(self, FocusState::Granted | FocusState::Ducked | FocusState::Lost)
    }
}

/// Commands accepted by the session.
#[derive(Debug)]
pub enum SessionCommand {
    ReplaceQueue(Queue),
    SelectTrack(Track),
    PlayAt(usize),
    TogglePlayPause,
    Next,
    Previous,
    SeekTo(u64),
    Stop,
    QueryProgress(oneshot::Sender<Progress>),
    GetSnapshot(oneshot::Sender<SessionSnapshot>),
    Teardown(Option<oneshot::Sender<()>>),
}

/// Events produced by collaborators, funnelled into the session task.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InternalEvent {
    Renderer { generation: Generation, event: RendererEvent },
    Focus { grant: u64, change: FocusChange },
}

/// Position and duration of the active track in milliseconds. Zero when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub position_millis: u64,
    pub duration_millis: u64,
}

/// What the now-playing display should show.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: Track,
    pub is_playing: bool,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub play_state: PlayState,
    pub focus_state: FocusState,
    pub active_track: Option<Track>,
    pub queue_len: usize,
    pub current_index: Option<usize>,
    pub progress: Progress,
}

/// Broadcast to every subscriber of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged { state: PlayState, track: Option<Track> },
    QueueChanged { len: usize, current_index: Option<usize> },
    FocusChanged(FocusState),
    Seeked { position_millis: u64 },
    Error(SessionError),
    /// The session stopped and accepts no more commands.
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Audio focus denied")]
    FocusDenied,

    #[error("Failed to open track {track_id}: {message}")]
    RendererBind { track_id: String, message: String },

    #[error("Playback of track {track_id} failed: {message}")]
    RendererRuntime { track_id: String, message: String },

    #[error("Playback session is closed")]
    Closed,
}

/// Receives now-playing updates. Implementations must not block.
pub trait NowPlayingSink: Send + Sync {
    fn update(&self, now_playing: &NowPlaying);

    /// Called when the session goes away.
    fn clear(&self);
}
