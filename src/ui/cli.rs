//! Command-line interface implementation

use clap::Parser;
use std::error::Error;

use crate::catalog::Track;
use crate::ui::display::format_millis;

/// Command-line arguments for r-mymusic
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Terminal music player for a remote song catalog", long_about = None)]
pub struct Args {
    /// Base URL of the song catalog service
    #[arg(short = 'u', long, env = "MYMUSIC_CATALOG_URL")]
    pub catalog_url: Option<String>,

    /// ALSA device to use
    #[arg(short = 'd', long, env = "MYMUSIC_ALSA_DEVICE")]
    pub alsa_device: Option<String>,

    /// Config file path
    #[arg(short, long, env = "MYMUSIC_CONFIG")]
    pub config: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

/// A line typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Zero-based song index
    Play(usize),
    TogglePlayPause,
    Next,
    Previous,
    /// Target position in milliseconds
    Seek(u64),
    Stop,
    List,
    Reload,
    Duck,
    Interrupt,
    Regain,
    Help,
    Quit,
}

impl UserCommand {
    /// Parses one input line. Song numbers are one-based as listed.
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut parts = input.split_whitespace();
        let Some(head) = parts.next() else {
            return Err("Empty command".to_string());
        };
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(format!("Too many arguments: {}", input.trim()));
        }

        if let Ok(number) = head.parse::<usize>() {
            return match (number, arg) {
                (0, _) => Err("Song numbers start at 1".to_string()),
                (n, None) => Ok(UserCommand::Play(n - 1)),
                (_, Some(extra)) => Err(format!("Unexpected argument: {}", extra)),
            };
        }

        let command = match (head.to_ascii_lowercase().as_str(), arg) {
            ("p", None) => UserCommand::TogglePlayPause,
            ("n", None) => UserCommand::Next,
            ("b", None) => UserCommand::Previous,
            ("s", Some(secs)) => {
                let secs: u64 = secs.parse().map_err(|_| format!("Invalid seek position: {}", secs))?;
                UserCommand::Seek(secs.saturating_mul(1000))
            }
            ("s", None) => return Err("Usage: s <seconds>".to_string()),
            ("x", None) => UserCommand::Stop,
            ("l", None) => UserCommand::List,
            ("r", None) => UserCommand::Reload,
            ("d", None) => UserCommand::Duck,
            ("i", None) => UserCommand::Interrupt,
            ("g", None) => UserCommand::Regain,
            ("h", None) | ("?", None) => UserCommand::Help,
            ("q", None) => UserCommand::Quit,
            (_, Some(extra)) if head.len() == 1 => return Err(format!("Unexpected argument: {}", extra)),
            _ => return Err(format!("Unknown command: {}", head)),
        };
        Ok(command)
    }
}

/// CLI user interface for interacting with the application
pub struct Cli {
    pub args: Args,
}

impl Cli {
    pub fn new() -> Self {
        Cli { args: Args::parse() }
    }

    /// Display the song list, numbered from 1
    pub fn display_songs(&self, songs: &[Track]) {
        println!("{}", render_song_table(songs));
    }

    pub fn display_help(&self) {
        println!("{}", HELP_TEXT);
    }

    pub fn display_error(&self, error: &dyn Error) {
        eprintln!("Error: {}", error);
    }

    pub fn display_message(&self, message: &str) {
        println!("{}", message);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  <n>        play song number n
  p          play/pause
  n / b      next / previous song
  s <secs>   seek to position
  x          stop
  l          list songs
  r          reload songs from the catalog
  d / i / g  simulate duck / interruption / regain of audio focus
  h          show this help
  q          quit";

pub fn render_song_table(songs: &[Track]) -> String {
    if songs.is_empty() {
        return "No songs available.".to_string();
    }
    let mut out = String::new();
    out.push_str(&format!("\n{:<5} {:<30} {:<20} {:<20} {}\n", "#", "Title", "Artist", "Album", "Length"));
    out.push_str(&"-".repeat(85));
    out.push('\n');
    for (index, song) in songs.iter().enumerate() {
        let length = if song.duration_millis > 0 { format_millis(song.duration_millis) } else { "--:--".to_string() };
        out.push_str(&format!(
            "{:<5} {:<30} {:<20} {:<20} {}\n",
            index + 1,
            truncate(&song.title, 28),
            truncate(&song.artist, 18),
            truncate(&song.album, 18),
            length
        ));
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut.trim_end())
    } else {
        text.to_string()
    }
}
