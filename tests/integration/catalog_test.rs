//! Integration tests for the HTTP song catalog
//!
//! A wiremock server stands in for the catalog service.

use r_mymusic::catalog::{CatalogError, HttpSongCatalog, SongCatalog, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn serve_songs(response: ResponseTemplate) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/songs"))
        .respond_with(response)
        .mount(&mock_server)
        .await;
    mock_server
}

#[cfg(test)]
mod catalog_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_songs_in_server_order() {
        let mock_server = serve_songs(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 7,
                "title": "Intro",
                "artist": "The Band",
                "album": "First",
                "duration": 61000,
                "data": "http://media.example.com/7.mp3",
                "albumArt": "http://media.example.com/7.jpg"
            },
            { "id": "b-2", "title": "Untagged", "data": "/music/untagged.flac" }
        ])))
        .await;

        let catalog = HttpSongCatalog::new(&mock_server.uri(), TIMEOUT).unwrap();
        let songs = catalog.fetch().await.unwrap();

        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].id, "7");
        assert_eq!(songs[0].album, "First");
        assert_eq!(songs[0].duration_millis, 61_000);
        assert!(songs[0].is_remote());
        assert_eq!(songs[0].artwork_locator.as_deref(), Some("http://media.example.com/7.jpg"));
        assert_eq!(songs[1].id, "b-2");
        assert_eq!(songs[1].artist, UNKNOWN_ARTIST);
        assert_eq!(songs[1].album, UNKNOWN_ALBUM);
        assert_eq!(songs[1].duration_millis, 0);
    }

    #[tokio::test]
    async fn test_base_url_with_path_prefix() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/songs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let catalog = HttpSongCatalog::new(&format!("{}/api/v1", mock_server.uri()), TIMEOUT).unwrap();
        assert!(catalog.fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let mock_server = serve_songs(ResponseTemplate::new(503).set_body_string("maintenance")).await;
        let catalog = HttpSongCatalog::new(&mock_server.uri(), TIMEOUT).unwrap();

        match catalog.fetch().await.unwrap_err() {
            CatalogError::Status { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "maintenance");
            }
            e => panic!("Expected Status error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mock_server = serve_songs(ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;
        let catalog = HttpSongCatalog::new(&mock_server.uri(), TIMEOUT).unwrap();

        match catalog.fetch().await.unwrap_err() {
            CatalogError::InvalidResponse(_) => {}
            e => panic!("Expected InvalidResponse, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let catalog = HttpSongCatalog::new("http://127.0.0.1:1", TIMEOUT).unwrap();
        assert!(matches!(catalog.fetch().await, Err(CatalogError::Network(_))));
    }
}
