//! HTTP catalog client implementation

use crate::catalog::models::{SongEntry, Track};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;

const LOG_TARGET: &str = "r_mymusic::catalog::api";

/// Path of the song listing, relative to the catalog base URL.
pub const SONGS_PATH: &str = "songs";

/// Error types for catalog fetches
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),
    #[error("Catalog request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Catalog returned no songs")]
    Empty,
}

/// Source of the song list. Injected into whatever builds the playback host.
#[async_trait]
pub trait SongCatalog: Send + Sync {
    /// Fetches the ordered song list.
    async fn fetch(&self) -> Result<Vec<Track>, CatalogError>;
}

/// Catalog backed by a remote `GET {base}/songs` endpoint.
#[derive(Clone, Debug)]
pub struct HttpSongCatalog {
    client: Client,
    songs_url: Url,
}

impl HttpSongCatalog {
    /// Creates a client for the given base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let songs_url = Self::songs_url_for(base_url)?;
        debug!(target: LOG_TARGET, "Creating HttpSongCatalog for {}", songs_url);

        let client = match Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(target: LOG_TARGET, "Error creating HTTP client with timeout: {}. Falling back to default.", e);
                Client::new()
            }
        };

        Ok(HttpSongCatalog { client, songs_url })
    }

    /// Resolves the song listing URL, treating the base as a directory.
    pub fn songs_url_for(base_url: &str) -> Result<Url, CatalogError> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::InvalidUrl("catalog URL cannot be empty".to_string()));
        }
        let mut base = Url::parse(trimmed).map_err(|e| CatalogError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(CatalogError::InvalidUrl(format!("unsupported scheme '{}'", base.scheme())));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(SONGS_PATH).map_err(|e| CatalogError::InvalidUrl(e.to_string()))
    }

    pub fn songs_url(&self) -> &str {
        self.songs_url.as_str()
    }
}

#[async_trait]
impl SongCatalog for HttpSongCatalog {
    #[instrument(skip(self), fields(url = %self.songs_url))]
    async fn fetch(&self) -> Result<Vec<Track>, CatalogError> {
        info!(target: LOG_TARGET, "Fetching song catalog");
        let response = self.client.get(self.songs_url.clone()).send().await?;
        let status = response.status();
        trace!(target: LOG_TARGET, "Response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(target: LOG_TARGET, "Catalog request failed. Status: {}, Body: {}", status, body);
            return Err(CatalogError::Status { status, body });
        }

        let text = response.text().await?;
        let entries: Vec<SongEntry> = serde_json::from_str(&text).map_err(|e| {
            error!(target: LOG_TARGET, "JSON parsing error: {}", e);
            CatalogError::InvalidResponse(format!("Failed to parse song list: {}", e))
        })?;

        let tracks: Vec<Track> = entries.into_iter().map(Track::from).collect();
        info!(target: LOG_TARGET, "Fetched {} songs", tracks.len());
        Ok(tracks)
    }
}
