use std::io;
use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Errors raised by audio renderers.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("ALSA error: {0}")]
    Alsa(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Symphonia error: {0}")]
    Symphonia(#[from] SymphoniaError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing codec parameters: {0}")]
    MissingCodecParams(&'static str),

    #[error("Invalid source locator: {0}")]
    InvalidSource(String),

    #[error("Renderer already released")]
    Released,
}

impl From<alsa::Error> for RendererError {
    fn from(e: alsa::Error) -> Self {
        RendererError::Alsa(e.to_string())
    }
}
