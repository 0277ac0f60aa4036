use super::{Progress, SessionCommand, SessionError, SessionEvent, SessionSnapshot, LOG_TARGET};
use crate::catalog::Track;
use crate::queue::Queue;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

/// Cloneable front door to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
    progress_interval: Duration,
}

impl SessionHandle {
    pub(super) fn new(
        command_tx: mpsc::Sender<SessionCommand>,
        event_tx: broadcast::Sender<SessionEvent>,
        progress_interval: Duration,
    ) -> Self {
        Self { command_tx, event_tx, progress_interval }
    }

    /// Queues a command. Fails only when the session has shut down.
    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.command_tx.send(command).await.map_err(|_| SessionError::Closed)
    }

    pub async fn replace_queue(&self, queue: Queue) -> Result<(), SessionError> {
        self.send(SessionCommand::ReplaceQueue(queue)).await
    }

    pub async fn select_track(&self, track: Track) -> Result<(), SessionError> {
        self.send(SessionCommand::SelectTrack(track)).await
    }

    pub async fn play_at(&self, index: usize) -> Result<(), SessionError> {
        self.send(SessionCommand::PlayAt(index)).await
    }

    pub async fn toggle_play_pause(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::TogglePlayPause).await
    }

    pub async fn next(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Next).await
    }

    pub async fn previous(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Previous).await
    }

    pub async fn seek_to(&self, position_millis: u64) -> Result<(), SessionError> {
        self.send(SessionCommand::SeekTo(position_millis)).await
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Stop).await
    }

    /// Current progress; zero when nothing is loaded or the session is gone.
    pub async fn progress(&self) -> Progress {
        let (tx, rx) = oneshot::channel();
        if self.send(SessionCommand::QueryProgress(tx)).await.is_err() {
            return Progress::default();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetSnapshot(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Releases the renderer and focus, then waits until the session has
    /// finished. Calling it on a finished session is a no-op.
    pub async fn teardown(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        if self.send(SessionCommand::Teardown(Some(tx))).await.is_err() {
            debug!(target: LOG_TARGET, "Teardown on a finished session.");
            return Ok(());
        }
        // A dropped ack means the session ended on its own meanwhile.
        let _ = rx.await;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribes a display and starts polling progress for it.
    pub fn attach(&self) -> Attachment {
        let (progress_tx, progress_rx) = watch::channel(Progress::default());
        let handle = self.clone();
        let period = self.progress_interval;
        let poller = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let progress = handle.progress().await;
                trace!(target: LOG_TARGET, ?progress, "Progress polled.");
                if progress_tx.send(progress).is_err() || handle.is_closed() {
                    break;
                }
            }
        });
        Attachment { events: self.subscribe(), progress: progress_rx, poller: Some(poller) }
    }
}

/// A display's view of the session: broadcast events plus polled progress.
///
/// Polling stops on [`detach`](Attachment::detach) or drop.
#[derive(Debug)]
pub struct Attachment {
    events: broadcast::Receiver<SessionEvent>,
    progress: watch::Receiver<Progress>,
    poller: Option<JoinHandle<()>>,
}

impl Attachment {
    pub fn events(&mut self) -> &mut broadcast::Receiver<SessionEvent> {
        &mut self.events
    }

    /// A receiver that sees every polled progress value.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.clone()
    }

    pub fn latest_progress(&self) -> Progress {
        *self.progress.borrow()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().map_or(false, |p| !p.is_finished())
    }

    /// Stops progress polling. Idempotent.
    pub fn detach(&mut self) {
        if let Some(poller) = self.poller.take() {
            debug!(target: LOG_TARGET, "Detaching display, stopping progress polling.");
            poller.abort();
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.detach();
    }
}
