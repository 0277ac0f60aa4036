// src/session/run_loop.rs
use super::state::InternalEvent;
use super::{command_handler, PlaybackSession, SessionCommand, LOG_TARGET};
use tracing::{info, trace};

/// Applies commands and collaborator events one at a time until teardown.
pub async fn run_session_loop(session: &mut PlaybackSession) {
    info!(target: LOG_TARGET, "Session run loop started.");

    loop {
        tokio::select! {
            biased; // Check commands first

            command = session.command_rx.recv() => {
                match command {
                    Some(command) => {
                        trace!(target: LOG_TARGET, "Received command: {:?}", command);
                        dispatch_command(session, command).await;
                    }
                    None => {
                        info!(target: LOG_TARGET, "All session handles dropped, tearing down.");
                        command_handler::handle_teardown(session, None).await;
                    }
                }
            }

            Some(event) = session.internal_rx.recv() => {
                trace!(target: LOG_TARGET, "Received internal event: {:?}", event);
                match event {
                    InternalEvent::Renderer { generation, event } => {
                        command_handler::handle_renderer_event(session, generation, event).await
                    }
                    InternalEvent::Focus { grant, change } => {
                        command_handler::handle_focus_change(session, grant, change).await
                    }
                }
            }
        }

        if session.terminated {
            break;
        }
    }

    // Commands still queued get their reply channels dropped, which callers see as `Closed`.
    session.command_rx.close();
    info!(target: LOG_TARGET, "Session run loop finished.");
}

async fn dispatch_command(session: &mut PlaybackSession, command: SessionCommand) {
    match command {
        SessionCommand::ReplaceQueue(queue) => command_handler::handle_replace_queue(session, queue),
        SessionCommand::SelectTrack(track) => command_handler::handle_select_track(session, track).await,
        SessionCommand::PlayAt(index) => command_handler::handle_play_at(session, index).await,
        SessionCommand::TogglePlayPause => command_handler::handle_toggle_play_pause(session).await,
        SessionCommand::Next => command_handler::handle_next(session).await,
        SessionCommand::Previous => command_handler::handle_previous(session).await,
        SessionCommand::SeekTo(position_millis) => command_handler::handle_seek(session, position_millis),
        SessionCommand::Stop => command_handler::handle_stop(session),
        SessionCommand::QueryProgress(responder) => {
            let _ = responder.send(session.progress());
        }
        SessionCommand::GetSnapshot(responder) => {
            let _ = responder.send(session.snapshot());
        }
        SessionCommand::Teardown(ack) => command_handler::handle_teardown(session, ack).await,
    }
}
