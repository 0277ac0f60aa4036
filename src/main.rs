use r_mymusic::audio::AlsaRendererFactory;
use r_mymusic::catalog::HttpSongCatalog;
use r_mymusic::config::Settings;
use r_mymusic::focus::LocalFocusArbiter;
use r_mymusic::host::{HostError, PlaybackHost};
use r_mymusic::init_app_dirs;
use r_mymusic::session::{PlaybackSession, SessionCollaborators, SessionEvent};
use r_mymusic::ui::{Cli, TerminalDisplay, UserCommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_TARGET: &str = "r_mymusic::main";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("r_mymusic=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::new();
    let args = &cli.args;
    init_tracing(args.log_json);

    init_app_dirs()?;
    let config_path = match &args.config {
        Some(path) => PathBuf::from(path),
        None => Settings::default_path(),
    };
    let mut settings = Settings::load(&config_path)?;
    settings.apply_overrides(args.catalog_url.as_deref(), args.alsa_device.as_deref());
    settings.validate()?;
    info!(target: LOG_TARGET, catalog = %settings.catalog_url, device = %settings.alsa_device, "Settings loaded.");

    let catalog = Arc::new(HttpSongCatalog::new(&settings.catalog_url, settings.request_timeout())?);
    let focus = Arc::new(LocalFocusArbiter::new());
    let display = TerminalDisplay::new();
    let collaborators = SessionCollaborators {
        renderer_factory: Arc::new(AlsaRendererFactory::new(&settings.alsa_device, settings.request_timeout())?),
        focus_arbiter: focus.clone(),
        now_playing: Arc::new(display.clone()),
    };
    let (session, session_task) = PlaybackSession::spawn(collaborators, settings.session_config());
    let mut host = PlaybackHost::new(catalog, session);

    let mut attachment = host.attach();
    let mut progress = attachment.progress();
    let progress_display = display.clone();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let latest = *progress.borrow();
            progress_display.set_progress(latest);
        }
    });

    match host.load_songs().await {
        Ok(songs) => cli.display_songs(songs),
        Err(e) => cli.display_error(&e),
    }
    cli.display_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!(target: LOG_TARGET, "Input closed.");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match UserCommand::parse(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        cli.display_message(&message);
                        continue;
                    }
                };
                let outcome: Result<(), HostError> = match command {
                    UserCommand::Play(index) if index >= host.songs().len() => {
                        cli.display_message(&format!("Choose a song between 1 and {}", host.songs().len()));
                        Ok(())
                    }
                    UserCommand::Play(index) => host.play_index(index).await,
                    UserCommand::TogglePlayPause => host.session().toggle_play_pause().await.map_err(Into::into),
                    UserCommand::Next => host.session().next().await.map_err(Into::into),
                    UserCommand::Previous => host.session().previous().await.map_err(Into::into),
                    UserCommand::Seek(position) => host.session().seek_to(position).await.map_err(Into::into),
                    UserCommand::Stop => host.session().stop().await.map_err(Into::into),
                    UserCommand::List => {
                        cli.display_songs(host.songs());
                        Ok(())
                    }
                    UserCommand::Reload => host.load_songs().await.map(|songs| cli.display_songs(songs)),
                    UserCommand::Duck => {
                        focus.interrupt(true, true);
                        Ok(())
                    }
                    UserCommand::Interrupt => {
                        focus.interrupt(true, false);
                        Ok(())
                    }
                    UserCommand::Regain => {
                        focus.restore();
                        Ok(())
                    }
                    UserCommand::Help => {
                        cli.display_help();
                        Ok(())
                    }
                    UserCommand::Quit => break,
                };
                if let Err(e) = outcome {
                    cli.display_error(&e);
                }
            }

            event = attachment.events().recv() => {
                match event {
                    Ok(SessionEvent::Error(e)) => cli.display_error(&e),
                    Ok(SessionEvent::Terminated) => {
                        cli.display_message("Playback session ended.");
                        break;
                    }
                    Ok(other) => debug!(target: LOG_TARGET, "Session event: {:?}", other),
                    Err(RecvError::Lagged(skipped)) => warn!(target: LOG_TARGET, "Display lagged, skipped {} events.", skipped),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    attachment.detach();
    host.shutdown().await?;
    if let Err(e) = session_task.await {
        warn!(target: LOG_TARGET, "Session task ended abnormally: {}", e);
    }
    info!(target: LOG_TARGET, "Goodbye.");
    Ok(())
}
