use super::LOG_TARGET;
use crate::audio::{AudioRenderer, Generation};
use tracing::{debug, info};

struct LiveRenderer {
    generation: Generation,
    track_id: String,
    renderer: Box<dyn AudioRenderer>,
}

/// Holds at most one live renderer and hands out bind generations.
///
/// A generation identifies the renderer it was issued for; once that
/// renderer is released its generation never becomes current again.
#[derive(Default)]
pub(super) struct RendererSlot {
    live: Option<LiveRenderer>,
    last_generation: Generation,
}

impl RendererSlot {
    pub(super) fn next_generation(&mut self) -> Generation {
        self.last_generation += 1;
        self.last_generation
    }

    pub(super) fn install(&mut self, generation: Generation, track_id: &str, renderer: Box<dyn AudioRenderer>) {
        self.release();
        debug!(target: LOG_TARGET, generation, track_id, "Renderer installed.");
        self.live = Some(LiveRenderer { generation, track_id: track_id.to_string(), renderer });
    }

    /// Releases the live renderer, if any. Returns whether one was released.
    pub(super) fn release(&mut self) -> bool {
        match self.live.take() {
            Some(mut live) => {
                info!(target: LOG_TARGET, generation = live.generation, track_id = %live.track_id, "Releasing renderer.");
                live.renderer.release();
                true
            }
            None => false,
        }
    }

    pub(super) fn is_current(&self, generation: Generation) -> bool {
        self.live.as_ref().map_or(false, |live| live.generation == generation)
    }

    pub(super) fn is_loaded(&self) -> bool {
        self.live.is_some()
    }

    pub(super) fn renderer_mut(&mut self) -> Option<&mut Box<dyn AudioRenderer>> {
        self.live.as_mut().map(|live| &mut live.renderer)
    }

    pub(super) fn position(&self) -> Option<u64> {
        self.live.as_ref().and_then(|live| live.renderer.position())
    }

    pub(super) fn duration(&self) -> Option<u64> {
        self.live.as_ref().and_then(|live| live.renderer.duration())
    }
}

impl Drop for RendererSlot {
    fn drop(&mut self) {
        self.release();
    }
}
