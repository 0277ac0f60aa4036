//! Now-playing line and progress bar for the terminal

use crate::session::{NowPlaying, NowPlayingSink, Progress};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::warn;

const LOG_TARGET: &str = "r_mymusic::ui::display";
const BAR_TEMPLATE: &str = "{prefix} {msg} [{bar:30.cyan/blue}]";

/// Renders now-playing updates and polled progress on stderr.
#[derive(Debug, Clone)]
pub struct TerminalDisplay {
    bar: ProgressBar,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr()))
    }

    /// A display that draws nothing.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        match ProgressStyle::with_template(BAR_TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("=> ")),
            Err(e) => warn!(target: LOG_TARGET, "Invalid progress template: {}", e),
        }
        Self { bar }
    }

    pub fn set_progress(&self, progress: Progress) {
        if progress.duration_millis > 0 {
            self.bar.set_length(progress.duration_millis);
        }
        self.bar.set_position(progress.position_millis);
        self.bar.set_prefix(format!(
            "{} / {}",
            format_millis(progress.position_millis),
            format_millis(progress.duration_millis)
        ));
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl NowPlayingSink for TerminalDisplay {
    fn update(&self, now_playing: &NowPlaying) {
        if now_playing.track.duration_millis > 0 {
            self.bar.set_length(now_playing.track.duration_millis);
        }
        self.bar.set_message(now_playing_line(now_playing));
    }

    fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// `▶ Title - Artist (Album)`, with a pause sign while not playing.
pub fn now_playing_line(now_playing: &NowPlaying) -> String {
    let icon = if now_playing.is_playing { "▶" } else { "⏸" };
    let track = &now_playing.track;
    format!("{} {} - {} ({})", icon, track.title, track.artist, track.album)
}

/// Formats milliseconds as `m:ss`.
pub fn format_millis(millis: u64) -> String {
    let total_secs = millis / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
