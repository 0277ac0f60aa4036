//! Audio rendering: the renderer abstraction the session drives, plus the
//! ALSA/symphonia implementation used on Linux.

pub mod alsa_handler;
pub mod alsa_renderer;
pub mod decoder;
pub mod error;
pub mod sample_converter;
pub mod source;

pub use alsa_renderer::{AlsaRenderer, AlsaRendererFactory};
pub use error::RendererError;

use std::fmt;
use std::sync::Arc;

/// Identifies one bind of one renderer. Events carry it so that stale
/// events from a superseded renderer can be told apart.
pub type Generation = u64;

/// Asynchronous outcome of a bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEvent {
    Ready,
    Completed,
    Failed(String),
}

type DeliverFn = dyn Fn(Generation, RendererEvent) + Send + Sync;

/// Event sink handed to a renderer on bind, tagged with that bind's generation.
#[derive(Clone)]
pub struct RendererEvents {
    generation: Generation,
    deliver: Arc<DeliverFn>,
}

impl RendererEvents {
    pub fn new(generation: Generation, deliver: impl Fn(Generation, RendererEvent) + Send + Sync + 'static) -> Self {
        Self { generation, deliver: Arc::new(deliver) }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn ready(&self) {
        (self.deliver)(self.generation, RendererEvent::Ready);
    }

    pub fn completed(&self) {
        (self.deliver)(self.generation, RendererEvent::Completed);
    }

    pub fn failed(&self, message: impl Into<String>) {
        (self.deliver)(self.generation, RendererEvent::Failed(message.into()));
    }
}

impl fmt::Debug for RendererEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererEvents").field("generation", &self.generation).finish()
    }
}

/// Platform audio player for a single source.
///
/// `bind` returns immediately; readiness, completion and runtime failures
/// are reported later through the [`RendererEvents`] given to it. Control
/// calls never block on I/O.
pub trait AudioRenderer: Send {
    /// Starts asynchronous preparation of `source_locator`.
    fn bind(&mut self, source_locator: &str, events: RendererEvents) -> Result<(), RendererError>;

    /// Starts or resumes output. Valid once `Ready` has been reported.
    fn start(&mut self) -> Result<(), RendererError>;

    fn pause(&mut self) -> Result<(), RendererError>;

    /// Frees all resources. Idempotent; no events are delivered afterwards.
    fn release(&mut self);

    /// Playback position in milliseconds, if known.
    fn position(&self) -> Option<u64>;

    /// Source duration in milliseconds, if known.
    fn duration(&self) -> Option<u64>;

    fn seek(&mut self, position_millis: u64) -> Result<(), RendererError>;

    /// Output gain in `[0.0, 1.0]`.
    fn set_output_level(&mut self, level: f32);
}

/// Creates a fresh renderer for every track.
pub trait RendererFactory: Send + Sync {
    fn create(&self) -> Box<dyn AudioRenderer>;
}
