//! Front-end facing host: loads songs from the catalog and forwards user
//! intent to the playback session.

use crate::catalog::{CatalogError, SongCatalog, Track};
use crate::queue::Queue;
use crate::session::{Attachment, SessionError, SessionHandle};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

const LOG_TARGET: &str = "r_mymusic::host";

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub struct PlaybackHost {
    catalog: Arc<dyn SongCatalog>,
    session: SessionHandle,
    songs: Vec<Track>,
}

impl PlaybackHost {
    pub fn new(catalog: Arc<dyn SongCatalog>, session: SessionHandle) -> Self {
        Self { catalog, session, songs: Vec::new() }
    }

    /// Fetches the song list and hands it to the session as the new queue.
    ///
    /// On failure or an empty list the session gets an empty queue and the
    /// error is returned for display.
    #[instrument(skip(self))]
    pub async fn load_songs(&mut self) -> Result<&[Track], HostError> {
        let fetched = self.catalog.fetch().await.and_then(|songs| {
            if songs.is_empty() {
                Err(CatalogError::Empty)
            } else {
                Ok(songs)
            }
        });

        match fetched {
            Ok(songs) => {
                info!(target: LOG_TARGET, "Loaded {} songs.", songs.len());
                self.session.replace_queue(Queue::new(songs.clone())).await?;
                self.songs = songs;
                Ok(&self.songs)
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Loading songs failed: {}", e);
                self.songs.clear();
                self.session.replace_queue(Queue::empty()).await?;
                Err(e.into())
            }
        }
    }

    /// Songs from the last successful load.
    pub fn songs(&self) -> &[Track] {
        &self.songs
    }

    pub async fn play_song(&self, track: &Track) -> Result<(), HostError> {
        self.session.select_track(track.clone()).await?;
        Ok(())
    }

    pub async fn play_index(&self, index: usize) -> Result<(), HostError> {
        self.session.play_at(index).await?;
        Ok(())
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Subscribes a display to session events and progress polling.
    pub fn attach(&self) -> Attachment {
        self.session.attach()
    }

    /// Tears the session down, releasing the renderer and focus.
    pub async fn shutdown(self) -> Result<(), HostError> {
        info!(target: LOG_TARGET, "Shutting down playback host.");
        self.session.teardown().await?;
        Ok(())
    }
}
