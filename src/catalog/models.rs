//! Data models for catalog responses and playable tracks

use serde::{Deserialize, Serialize};

/// Album name used when the catalog does not provide one.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
/// Artist name used when the catalog does not provide one.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Immutable metadata plus the source locator for one playable item.
///
/// Equality is full value equality: two entries with identical fields are
/// indistinguishable to the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in milliseconds, 0 when unknown
    pub duration_millis: u64,
    /// Local path or remote URL
    pub source_locator: String,
    pub artwork_locator: Option<String>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        source_locator: impl Into<String>,
    ) -> Self {
        Track {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album: UNKNOWN_ALBUM.to_string(),
            duration_millis: 0,
            source_locator: source_locator.into(),
            artwork_locator: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    pub fn with_duration_millis(mut self, duration_millis: u64) -> Self {
        self.duration_millis = duration_millis;
        self
    }

    pub fn with_artwork(mut self, artwork_locator: impl Into<String>) -> Self {
        self.artwork_locator = Some(artwork_locator.into());
        self
    }

    /// True when the source locator points at an HTTP(S) resource.
    pub fn is_remote(&self) -> bool {
        self.source_locator.starts_with("http://") || self.source_locator.starts_with("https://")
    }
}

/// Identifier as served by the catalog; older servers emit numbers.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SongId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for SongId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SongId::Number(n) => write!(f, "{}", n),
            SongId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One entry of the `GET /songs` response
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SongEntry {
    pub id: SongId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration: Option<i64>,
    /// File path or stream URL
    pub data: String,
    #[serde(rename = "albumArt", default)]
    pub album_art: Option<String>,
}

impl From<SongEntry> for Track {
    fn from(entry: SongEntry) -> Self {
        let album = entry
            .album
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
        let artist = entry
            .artist
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        Track {
            id: entry.id.to_string(),
            title: entry.title,
            artist,
            album,
            duration_millis: entry.duration.unwrap_or(0).max(0) as u64,
            source_locator: entry.data,
            artwork_locator: entry.album_art,
        }
    }
}
