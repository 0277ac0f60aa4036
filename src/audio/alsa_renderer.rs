use crate::audio::alsa_handler::AlsaPcmHandler;
use crate::audio::decoder::{DecodedChunk, SymphoniaDecoder};
use crate::audio::error::RendererError;
use crate::audio::sample_converter::clamp_level;
use crate::audio::source::{open_source, SourceLocation};
use crate::audio::{AudioRenderer, RendererEvents, RendererFactory};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

const LOG_TARGET: &str = "r_mymusic::audio::alsa_renderer";
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long a released renderer's playback thread may take to wind down
/// before it is left to finish on its own.
pub const THREAD_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds one [`AlsaRenderer`] per track, all sharing an HTTP client.
#[derive(Debug, Clone)]
pub struct AlsaRendererFactory {
    device_name: String,
    client: Client,
}

impl AlsaRendererFactory {
    pub fn new(device_name: &str, connect_timeout: Duration) -> Result<Self, RendererError> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { device_name: device_name.to_string(), client })
    }
}

impl RendererFactory for AlsaRendererFactory {
    fn create(&self) -> Box<dyn AudioRenderer> {
        Box::new(AlsaRenderer::new(&self.device_name, self.client.clone()))
    }
}

/// State shared between the renderer and its playback thread.
#[derive(Debug)]
struct PlaybackControl {
    paused: AtomicBool,
    stopped: AtomicBool,
    output_level_bits: AtomicU32,
    position_millis: AtomicU64,
    /// Zero while unknown
    duration_millis: AtomicU64,
    pending_seek: Mutex<Option<u64>>,
}

impl PlaybackControl {
    fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            output_level_bits: AtomicU32::new(1.0f32.to_bits()),
            position_millis: AtomicU64::new(0),
            duration_millis: AtomicU64::new(0),
            pending_seek: Mutex::new(None),
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn output_level(&self) -> f32 {
        f32::from_bits(self.output_level_bits.load(Ordering::Relaxed))
    }

    fn duration(&self) -> Option<u64> {
        match self.duration_millis.load(Ordering::Relaxed) {
            0 => None,
            d => Some(d),
        }
    }

    fn request_seek(&self, position_millis: u64) {
        if let Ok(mut pending) = self.pending_seek.lock() {
            *pending = Some(position_millis);
        }
        self.position_millis.store(position_millis, Ordering::Relaxed);
    }

    fn take_seek(&self) -> Option<u64> {
        self.pending_seek.lock().ok().and_then(|mut pending| pending.take())
    }

    fn has_pending_seek(&self) -> bool {
        self.pending_seek.lock().map(|pending| pending.is_some()).unwrap_or(false)
    }
}

enum PlaybackExit {
    Finished,
    Stopped,
}

/// Plays one source on an ALSA device.
///
/// Binding fetches and probes the source on the tokio runtime; `start`
/// moves the decoder onto a dedicated thread that writes to ALSA.
pub struct AlsaRenderer {
    device_name: String,
    client: Client,
    control: Arc<PlaybackControl>,
    prepared: Arc<Mutex<Option<SymphoniaDecoder>>>,
    events: Option<RendererEvents>,
    load_task: Option<JoinHandle<()>>,
    playback_thread: Option<thread::JoinHandle<()>>,
    released: bool,
}

impl AlsaRenderer {
    pub fn new(device_name: &str, client: Client) -> Self {
        Self {
            device_name: device_name.to_string(),
            client,
            control: Arc::new(PlaybackControl::new()),
            prepared: Arc::new(Mutex::new(None)),
            events: None,
            load_task: None,
            playback_thread: None,
            released: false,
        }
    }

    fn ensure_live(&self) -> Result<(), RendererError> {
        if self.released {
            Err(RendererError::Released)
        } else {
            Ok(())
        }
    }
}

async fn prepare_decoder(client: &Client, location: SourceLocation) -> Result<SymphoniaDecoder, RendererError> {
    let source = open_source(client, &location).await?;
    let extension = location.extension();
    tokio::task::spawn_blocking(move || SymphoniaDecoder::new(source, extension.as_deref()))
        .await
        .map_err(|e| RendererError::Decoding(format!("Probe task failed: {}", e)))?
}

impl AudioRenderer for AlsaRenderer {
    #[instrument(skip(self, events), fields(device = %self.device_name, generation = events.generation()))]
    fn bind(&mut self, source_locator: &str, events: RendererEvents) -> Result<(), RendererError> {
        self.ensure_live()?;
        if self.events.is_some() {
            return Err(RendererError::InvalidState("Renderer already bound".to_string()));
        }
        let location = SourceLocation::parse(source_locator)?;
        let runtime = Handle::try_current()
            .map_err(|e| RendererError::InvalidState(format!("No async runtime for loading: {}", e)))?;

        let client = self.client.clone();
        let control = Arc::clone(&self.control);
        let prepared = Arc::clone(&self.prepared);
        let task_events = events.clone();
        debug!(target: LOG_TARGET, "Loading source {:?}", location);

        self.load_task = Some(runtime.spawn(async move {
            let result = prepare_decoder(&client, location).await;
            if control.is_stopped() {
                return;
            }
            match result {
                Ok(decoder) => {
                    control.duration_millis.store(decoder.duration_millis().unwrap_or(0), Ordering::Relaxed);
                    match prepared.lock() {
                        Ok(mut slot) => *slot = Some(decoder),
                        Err(_) => {
                            task_events.failed("Renderer state poisoned");
                            return;
                        }
                    }
                    task_events.ready();
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Failed to prepare source: {}", e);
                    task_events.failed(e.to_string());
                }
            }
        }));
        self.events = Some(events);
        Ok(())
    }

    fn start(&mut self) -> Result<(), RendererError> {
        self.ensure_live()?;
        if self.playback_thread.is_some() {
            debug!(target: LOG_TARGET, "Resuming playback.");
            self.control.paused.store(false, Ordering::SeqCst);
            return Ok(());
        }

        let events = self
            .events
            .clone()
            .ok_or_else(|| RendererError::InvalidState("Renderer not bound".to_string()))?;
        let decoder = self
            .prepared
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| RendererError::InvalidState("Source not prepared yet".to_string()))?;

        self.control.paused.store(false, Ordering::SeqCst);
        let control = Arc::clone(&self.control);
        let device_name = self.device_name.clone();
        let handle = thread::Builder::new()
            .name("alsa-playback".to_string())
            .spawn(move || run_playback(decoder, &device_name, &control, &events))?;
        self.playback_thread = Some(handle);
        info!(target: LOG_TARGET, "Playback started on '{}'.", self.device_name);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), RendererError> {
        self.ensure_live()?;
        self.control.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.control.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = self.load_task.take() {
            task.abort();
        }
        if let Some(handle) = self.playback_thread.take() {
            reap_playback_thread(handle, THREAD_SHUTDOWN_TIMEOUT);
        }
        if let Ok(mut slot) = self.prepared.lock() {
            slot.take();
        }
        self.events = None;
        debug!(target: LOG_TARGET, "Renderer released.");
    }

    fn position(&self) -> Option<u64> {
        if self.released || self.events.is_none() {
            return None;
        }
        Some(self.control.position_millis.load(Ordering::Relaxed))
    }

    fn duration(&self) -> Option<u64> {
        if self.released {
            return None;
        }
        self.control.duration()
    }

    fn seek(&mut self, position_millis: u64) -> Result<(), RendererError> {
        self.ensure_live()?;
        let target = match self.control.duration() {
            Some(duration) => position_millis.min(duration),
            None => position_millis,
        };
        self.control.request_seek(target);
        Ok(())
    }

    fn set_output_level(&mut self, level: f32) {
        self.control.output_level_bits.store(clamp_level(level).to_bits(), Ordering::Relaxed);
    }
}

impl Drop for AlsaRenderer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Waits for a stopped playback thread without blocking the caller.
///
/// On a tokio runtime the join happens on the blocking pool and is given up
/// after `timeout`; the thread may still be inside `writei` or `drain`.
/// Outside a runtime the caller joins directly.
pub(crate) fn reap_playback_thread(handle: thread::JoinHandle<()>, timeout: Duration) -> Option<JoinHandle<()>> {
    let Ok(runtime) = Handle::try_current() else {
        if handle.join().is_err() {
            error!(target: LOG_TARGET, "Playback thread panicked.");
        }
        return None;
    };
    Some(runtime.spawn(async move {
        let join = tokio::task::spawn_blocking(move || handle.join());
        tokio::select! {
            biased;
            result = join => match result {
                Ok(Ok(())) => debug!(target: LOG_TARGET, "Playback thread finished."),
                Ok(Err(_)) => error!(target: LOG_TARGET, "Playback thread panicked."),
                Err(e) => error!(target: LOG_TARGET, "Joining playback thread failed: {}", e),
            },
            _ = tokio::time::sleep(timeout) => {
                error!(target: LOG_TARGET, "Playback thread still running after {:?}, detaching.", timeout);
            }
        }
    }))
}

fn run_playback(mut decoder: SymphoniaDecoder, device_name: &str, control: &PlaybackControl, events: &RendererEvents) {
    match play_until_done(&mut decoder, device_name, control) {
        Ok(PlaybackExit::Finished) if control.is_stopped() => debug!(target: LOG_TARGET, "Finished after stop."),
        Ok(PlaybackExit::Finished) => {
            info!(target: LOG_TARGET, "Playback reached end of stream.");
            events.completed();
        }
        Ok(PlaybackExit::Stopped) => debug!(target: LOG_TARGET, "Playback stopped."),
        Err(e) if control.is_stopped() => debug!(target: LOG_TARGET, "Error after stop ignored: {}", e),
        Err(e) => {
            error!(target: LOG_TARGET, "Playback failed: {}", e);
            events.failed(e.to_string());
        }
    }
}

fn play_until_done(
    decoder: &mut SymphoniaDecoder,
    device_name: &str,
    control: &PlaybackControl,
) -> Result<PlaybackExit, RendererError> {
    let mut pcm = AlsaPcmHandler::new(device_name);
    pcm.initialize(decoder.spec())?;
    let mut device_paused = false;

    loop {
        if control.is_stopped() {
            return Ok(PlaybackExit::Stopped);
        }

        if let Some(target) = control.take_seek() {
            match decoder.seek(target) {
                Ok(actual) => control.position_millis.store(actual, Ordering::Relaxed),
                Err(e) => warn!(target: LOG_TARGET, "Seek to {} ms failed: {}", target, e),
            }
        }

        if control.paused.load(Ordering::SeqCst) {
            if !device_paused {
                if let Err(e) = pcm.pause() {
                    warn!(target: LOG_TARGET, "Device pause unsupported, holding output: {}", e);
                }
                device_paused = true;
            }
            thread::sleep(PAUSE_POLL_INTERVAL);
            continue;
        }
        if device_paused {
            if let Err(e) = pcm.resume() {
                warn!(target: LOG_TARGET, "Device resume failed: {}", e);
            }
            device_paused = false;
        }

        match decoder.next_chunk(control.output_level())? {
            DecodedChunk::Samples { samples, timestamp_millis } => {
                control.position_millis.store(timestamp_millis, Ordering::Relaxed);
                pcm.write_all(&samples, || control.is_stopped() || control.has_pending_seek())?;
            }
            DecodedChunk::EndOfStream => {
                pcm.drain()?;
                if let Some(duration) = control.duration() {
                    control.position_millis.store(duration, Ordering::Relaxed);
                }
                return Ok(PlaybackExit::Finished);
            }
        }
    }
}
