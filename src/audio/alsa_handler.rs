use crate::audio::error::RendererError;
use alsa::nix::errno::Errno;
use alsa::pcm::{Access, Format, HwParams, State as PcmState, PCM};
use alsa::{Direction, ValueOr};
use std::ffi::CString;
use symphonia::core::audio::SignalSpec;
use tracing::{debug, error, info, instrument, warn};

const LOG_TARGET: &str = "r_mymusic::audio::alsa_handler";

/// Owns one ALSA PCM playback device configured for interleaved S16.
pub struct AlsaPcmHandler {
    device_name: String,
    pcm: Option<PCM>,
    channels: usize,
}

impl AlsaPcmHandler {
    pub fn new(device_name: &str) -> Self {
        debug!(target: LOG_TARGET, "Creating AlsaPcmHandler for device: {}", device_name);
        AlsaPcmHandler { device_name: device_name.to_string(), pcm: None, channels: 0 }
    }

    /// Opens the device for `spec`, closing any previously opened PCM.
    #[instrument(skip(self, spec), fields(device = %self.device_name, rate = spec.rate, channels = spec.channels.count()))]
    pub fn initialize(&mut self, spec: SignalSpec) -> Result<(), RendererError> {
        self.close();

        let device = CString::new(self.device_name.clone())
            .map_err(|e| RendererError::Alsa(format!("Invalid device name: {}", e)))?;
        let pcm = PCM::open(&device, Direction::Playback, false)?;

        {
            let hwp = HwParams::any(&pcm)?;
            hwp.set_access(Access::RWInterleaved)?;
            hwp.set_format(Format::s16())?;
            hwp.set_channels(spec.channels.count() as u32)?;
            hwp.set_rate_near(spec.rate, ValueOr::Nearest)?;
            let actual_rate = hwp.get_rate()?;
            if actual_rate != spec.rate {
                // No resampling stage: the track plays at the negotiated rate.
                warn!(
                    target: LOG_TARGET,
                    "ALSA rate negotiation: requested={}, actual={}",
                    spec.rate, actual_rate
                );
            }
            pcm.hw_params(&hwp)?;

            let swp = pcm.sw_params_current()?;
            let buffer_size = hwp.get_buffer_size()?;
            let period_size = hwp.get_period_size()?;
            swp.set_start_threshold(buffer_size - period_size)?;
            pcm.sw_params(&swp)?;
            debug!(target: LOG_TARGET, "ALSA parameters applied (buffer={}, period={}).", buffer_size, period_size);
        }

        self.pcm = Some(pcm);
        self.channels = spec.channels.count();
        info!(target: LOG_TARGET, "ALSA device '{}' ready.", self.device_name);
        Ok(())
    }

    /// Writes interleaved samples and returns the number of frames accepted.
    /// An underrun is recovered and reported as zero frames written.
    pub fn write_s16(&self, samples: &[i16]) -> Result<usize, RendererError> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or_else(|| RendererError::InvalidState("PCM not initialized for writing".to_string()))?;
        let io = pcm.io_i16()?;

        match io.writei(samples) {
            Ok(frames) => Ok(frames),
            Err(e) if e.errno() == Errno::EPIPE => {
                warn!(target: LOG_TARGET, "ALSA buffer underrun, recovering.");
                pcm.recover(libc::EPIPE, false)
                    .map_err(|re| RendererError::Alsa(format!("ALSA recovery failed: {}", re)))?;
                Ok(0)
            }
            Err(e) => {
                error!(target: LOG_TARGET, "ALSA write error: {}", e);
                Err(e.into())
            }
        }
    }

    /// Writes all of `samples`, retrying after underruns. Stops early when
    /// `should_stop` returns true.
    pub fn write_all(&self, samples: &[i16], should_stop: impl Fn() -> bool) -> Result<(), RendererError> {
        let channels = self.channels.max(1);
        let total_frames = samples.len() / channels;
        let mut written = 0;
        while written < total_frames {
            if should_stop() {
                break;
            }
            written += self.write_s16(&samples[written * channels..])?;
        }
        Ok(())
    }

    /// Blocks until queued audio has been played.
    pub fn drain(&self) -> Result<(), RendererError> {
        match &self.pcm {
            Some(pcm) if matches!(pcm.state(), PcmState::Running | PcmState::Prepared) => {
                debug!(target: LOG_TARGET, "Draining ALSA buffer.");
                pcm.drain()?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn pause(&self) -> Result<(), RendererError> {
        match &self.pcm {
            Some(pcm) if pcm.state() == PcmState::Running => {
                debug!(target: LOG_TARGET, "Pausing ALSA PCM device.");
                pcm.pause(true)?;
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(RendererError::InvalidState("PCM not initialized for pausing".to_string())),
        }
    }

    pub fn resume(&self) -> Result<(), RendererError> {
        match &self.pcm {
            Some(pcm) if pcm.state() == PcmState::Paused => {
                debug!(target: LOG_TARGET, "Resuming ALSA PCM device.");
                pcm.pause(false)?;
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(RendererError::InvalidState("PCM not initialized for resuming".to_string())),
        }
    }

    /// Drops pending frames and closes the device.
    pub fn close(&mut self) {
        if let Some(pcm) = self.pcm.take() {
            if matches!(pcm.state(), PcmState::Running | PcmState::Prepared | PcmState::Paused) {
                if let Err(e) = pcm.drop() {
                    warn!(target: LOG_TARGET, "Error dropping ALSA buffer during close (ignored): {}", e);
                }
            }
            debug!(target: LOG_TARGET, "ALSA PCM closed.");
        }
        self.channels = 0;
    }
}

impl Drop for AlsaPcmHandler {
    fn drop(&mut self) {
        self.close();
    }
}
