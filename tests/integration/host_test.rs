//! Integration tests for the playback host
//!
//! The host is wired to a wiremock catalog and a session with scripted
//! collaborators.

use crate::test_utils::{Harness, ScriptedFocusArbiter, ScriptedRendererFactory, RecordingSink};
use r_mymusic::catalog::{CatalogError, HttpSongCatalog};
use r_mymusic::host::{HostError, PlaybackHost};
use r_mymusic::session::{PlayState, PlaybackSession, SessionCollaborators, SessionConfig};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn host_for(mock_server: &MockServer) -> (PlaybackHost, Harness) {
    let harness = Harness::start();
    let catalog = HttpSongCatalog::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
    let host = PlaybackHost::new(Arc::new(catalog), harness.handle.clone());
    (host, harness)
}

async fn mount_songs(mock_server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/songs"))
        .respond_with(response)
        .mount(mock_server)
        .await;
}

fn two_songs() -> serde_json::Value {
    serde_json::json!([
        { "id": 1, "title": "One", "artist": "A", "duration": 1000, "data": "/music/1.mp3" },
        { "id": 2, "title": "Two", "artist": "B", "duration": 2000, "data": "/music/2.mp3" }
    ])
}

#[cfg(test)]
mod host_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_load_songs_fills_session_queue() {
        let mock_server = MockServer::start().await;
        mount_songs(&mock_server, ResponseTemplate::new(200).set_body_json(two_songs())).await;
        let (mut host, harness) = host_for(&mock_server).await;

        let songs = host.load_songs().await.unwrap();
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[1].title, "Two");

        let snapshot = harness.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.queue_len, 2);
        assert_eq!(snapshot.play_state, PlayState::Idle);
    }

    #[tokio::test]
    async fn test_failed_load_installs_empty_queue() {
        let mock_server = MockServer::start().await;
        mount_songs(&mock_server, ResponseTemplate::new(200).set_body_json(two_songs())).await;
        let (mut host, harness) = host_for(&mock_server).await;
        host.load_songs().await.unwrap();

        mock_server.reset().await;
        mount_songs(&mock_server, ResponseTemplate::new(500).set_body_string("boom")).await;
        let err = host.load_songs().await.unwrap_err();
        assert!(matches!(err, HostError::Catalog(CatalogError::Status { .. })));
        assert!(host.songs().is_empty());
        assert_eq!(harness.handle.snapshot().await.unwrap().queue_len, 0);
    }

    #[tokio::test]
    async fn test_empty_catalog_is_an_error() {
        let mock_server = MockServer::start().await;
        mount_songs(&mock_server, ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).await;
        let (mut host, harness) = host_for(&mock_server).await;

        let err = host.load_songs().await.unwrap_err();
        assert!(matches!(err, HostError::Catalog(CatalogError::Empty)));
        assert_eq!(harness.handle.snapshot().await.unwrap().queue_len, 0);
    }

    #[tokio::test]
    async fn test_play_song_and_shutdown() {
        let mock_server = MockServer::start().await;
        mount_songs(&mock_server, ResponseTemplate::new(200).set_body_json(two_songs())).await;
        let (mut host, mut harness) = host_for(&mock_server).await;
        let second = host.load_songs().await.unwrap()[1].clone();

        host.play_song(&second).await.unwrap();
        assert_eq!(harness.expect_state(PlayState::Loading).await, Some(second));
        assert_eq!(harness.renderers.record(0).locator.as_deref(), Some("/music/2.mp3"));

        host.play_index(0).await.unwrap();
        let first = harness.expect_state(PlayState::Loading).await.unwrap();
        assert_eq!(first.title, "One");

        host.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), &mut harness.task).await.unwrap().unwrap();
        assert_eq!(harness.focus.releases(), 1);
        assert!(harness.renderers.record(1).released);
    }

    #[tokio::test]
    async fn test_host_reports_closed_session() {
        let mock_server = MockServer::start().await;
        mount_songs(&mock_server, ResponseTemplate::new(200).set_body_json(two_songs())).await;
        let renderers = ScriptedRendererFactory::new();
        let collaborators = SessionCollaborators {
            renderer_factory: Arc::new(renderers),
            focus_arbiter: Arc::new(ScriptedFocusArbiter::new()),
            now_playing: Arc::new(RecordingSink::default()),
        };
        let (handle, task) = PlaybackSession::spawn(collaborators, SessionConfig::default());
        handle.teardown().await.unwrap();
        task.await.unwrap();

        let catalog = HttpSongCatalog::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        let mut host = PlaybackHost::new(Arc::new(catalog), handle);
        assert!(matches!(host.load_songs().await, Err(HostError::Session(_))));
        assert!(matches!(host.play_index(0).await, Err(HostError::Session(_))));
    }
}
