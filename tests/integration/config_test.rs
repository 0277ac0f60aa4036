//! Integration tests for configuration management
//!
//! These tests verify that settings on disk turn into a working session
//! configuration.

use r_mymusic::config::{ConfigError, Settings};
use std::error::Error;
use std::time::Duration;
use tempfile::tempdir;

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// Test complete configuration workflow
    #[test]
    fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.catalog_url = "https://music.example.com/catalog/".to_string();
        settings.alsa_device = "hw:1,0".to_string();
        settings.progress_interval_ms = 250;
        settings.duck_level = 0.35;
        settings.validate()?;
        settings.save(&config_path)?;

        let mut loaded = Settings::load(&config_path)?;
        assert_eq!(loaded, settings);

        // Command-line values win over the file.
        loaded.apply_overrides(Some("http://localhost:9000/"), None);
        loaded.validate()?;
        assert_eq!(loaded.catalog_url, "http://localhost:9000/");
        assert_eq!(loaded.alsa_device, "hw:1,0");

        let session = loaded.session_config();
        assert_eq!(session.progress_interval, Duration::from_millis(250));
        assert_eq!(session.duck_level, 0.35);
        Ok(())
    }

    #[test]
    fn test_invalid_override_is_caught() {
        let mut settings = Settings::default();
        settings.apply_overrides(Some("ftp://music.example.com"), None);
        assert!(matches!(settings.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unreadable_config_reports_parse_error() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ \"catalog_url\": 42 }")?;
        assert!(matches!(Settings::load(&config_path), Err(ConfigError::Parse(_))));
        Ok(())
    }
}
