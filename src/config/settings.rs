//! Application settings and configuration management

use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Application settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Base URL of the song catalog service
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    /// ALSA device to use for audio playback
    #[serde(default = "default_alsa_device")]
    pub alsa_device: String,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_command_buffer_size")]
    pub command_buffer_size: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Output level while another source ducks playback
    #[serde(default = "default_duck_level")]
    pub duck_level: f32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_catalog_url() -> String {
    "http://localhost:8001/".to_string()
}

fn default_alsa_device() -> String {
    "default".to_string()
}

fn default_progress_interval_ms() -> u64 {
    1000
}

fn default_command_buffer_size() -> usize {
    32
}

fn default_event_capacity() -> usize {
    64
}

fn default_duck_level() -> f32 {
    0.2
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Error types for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            catalog_url: default_catalog_url(),
            alsa_device: default_alsa_device(),
            progress_interval_ms: default_progress_interval_ms(),
            command_buffer_size: default_command_buffer_size(),
            event_capacity: default_event_capacity(),
            duck_level: default_duck_level(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("r-mymusic").join("config.json")
    }

    /// Applies command-line or environment overrides.
    pub fn apply_overrides(&mut self, catalog_url: Option<&str>, alsa_device: Option<&str>) {
        if let Some(url) = catalog_url {
            self.catalog_url = url.to_string();
        }
        if let Some(device) = alsa_device {
            self.alsa_device = device.to_string();
        }
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.catalog_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Validation("Catalog URL cannot be empty".to_string()));
        }
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(ConfigError::Validation(format!(
                    "Catalog URL must use http or https, got '{}'",
                    parsed.scheme()
                )))
            }
            Err(e) => return Err(ConfigError::Validation(format!("Invalid catalog URL '{}': {}", url, e))),
        }
        if self.alsa_device.trim().is_empty() {
            return Err(ConfigError::Validation("ALSA device cannot be empty".to_string()));
        }
        if self.progress_interval_ms == 0 {
            return Err(ConfigError::Validation("Progress interval must be positive".to_string()));
        }
        if self.command_buffer_size == 0 || self.event_capacity == 0 {
            return Err(ConfigError::Validation("Channel capacities must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.duck_level) {
            return Err(ConfigError::Validation(format!(
                "Duck level must be within 0.0..=1.0, got {}",
                self.duck_level
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("Request timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            command_buffer_size: self.command_buffer_size,
            event_capacity: self.event_capacity,
            duck_level: self.duck_level,
            progress_interval: Duration::from_millis(self.progress_interval_ms),
        }
    }
}
