use crate::audio::error::RendererError;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use symphonia::core::io::MediaSource;
use tracing::{debug, info, trace};

const LOG_TARGET: &str = "r_mymusic::audio::source";

/// Where a track's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Remote(String),
    Local(PathBuf),
}

impl SourceLocation {
    /// Classifies a locator: http(s) URLs are remote, `file://` URLs and
    /// plain paths are local.
    pub fn parse(locator: &str) -> Result<Self, RendererError> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(RendererError::InvalidSource("empty locator".to_string()));
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(SourceLocation::Remote(trimmed.to_string()));
        }
        if let Some(path) = trimmed.strip_prefix("file://") {
            if path.is_empty() {
                return Err(RendererError::InvalidSource(locator.to_string()));
            }
            return Ok(SourceLocation::Local(PathBuf::from(path)));
        }
        if trimmed.contains("://") {
            return Err(RendererError::InvalidSource(format!("unsupported scheme in {}", locator)));
        }
        Ok(SourceLocation::Local(PathBuf::from(trimmed)))
    }

    /// File extension used as a probe hint.
    pub fn extension(&self) -> Option<String> {
        let path = match self {
            SourceLocation::Remote(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                Path::new(without_query).to_path_buf()
            }
            SourceLocation::Local(path) => path.clone(),
        };
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
    }
}

/// Opens the audio bytes behind `location`.
pub async fn open_source(client: &Client, location: &SourceLocation) -> Result<Box<dyn MediaSource>, RendererError> {
    match location {
        SourceLocation::Remote(url) => {
            debug!(target: LOG_TARGET, "Requesting remote audio: {}", url);
            let response = client.get(url).send().await?.error_for_status()?;
            let wrapper = ReqwestStreamWrapper::new_async(response.bytes_stream()).await?;
            Ok(Box::new(wrapper))
        }
        SourceLocation::Local(path) => {
            debug!(target: LOG_TARGET, "Opening local audio: {}", path.display());
            let path = path.clone();
            let file = tokio::task::spawn_blocking(move || File::open(path))
                .await
                .map_err(|e| RendererError::Stream(format!("File open task failed: {}", e)))??;
            Ok(Box::new(file))
        }
    }
}

/// Buffers a whole HTTP response in memory so symphonia gets `Read + Seek`.
pub struct ReqwestStreamWrapper {
    buffer: Cursor<Vec<u8>>,
}

impl ReqwestStreamWrapper {
    pub async fn new_async(
        stream: impl futures_util::Stream<Item = Result<Bytes, reqwest::Error>> + Send,
    ) -> Result<Self, reqwest::Error> {
        let mut stream = Box::pin(stream);
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);
            trace!(target: LOG_TARGET, "Downloaded {} bytes (total {})", chunk.len(), buffer.len());
        }
        info!(target: LOG_TARGET, "Buffered remote source ({} bytes).", buffer.len());
        Ok(Self { buffer: Cursor::new(buffer) })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { buffer: Cursor::new(bytes) }
    }
}

impl Read for ReqwestStreamWrapper {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read(buf)
    }
}

impl Seek for ReqwestStreamWrapper {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl MediaSource for ReqwestStreamWrapper {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.buffer.get_ref().len() as u64)
    }
}
