use crate::audio::error::RendererError;
use crate::audio::sample_converter;
use std::io;
use symphonia::core::audio::SignalSpec;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, trace, warn};

const LOG_TARGET: &str = "r_mymusic::audio::decoder";

/// One step of decoding.
#[derive(Debug)]
pub enum DecodedChunk {
    /// Interleaved S16 samples starting at `timestamp_millis`.
    Samples { samples: Vec<i16>, timestamp_millis: u64 },
    EndOfStream,
}

/// Format reader plus codec for the first playable track of a source.
pub struct SymphoniaDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    spec: SignalSpec,
    duration_millis: Option<u64>,
}

impl SymphoniaDecoder {
    /// Probes `source` and prepares a decoder. Blocking: call off the async runtime.
    pub fn new(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self, RendererError> {
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }
        let mss = MediaSourceStream::new(source, Default::default());
        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions { enable_gapless: true, ..Default::default() },
            &MetadataOptions::default(),
        )?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| RendererError::UnsupportedFormat("No suitable audio track found".to_string()))?
            .clone();

        let decoder = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let spec = SignalSpec::new(
            track.codec_params.sample_rate.ok_or(RendererError::MissingCodecParams("sample rate"))?,
            track.codec_params.channels.ok_or(RendererError::MissingCodecParams("channels map"))?,
        );
        let time_base = track.codec_params.time_base;
        let duration_millis = match (time_base, track.codec_params.n_frames) {
            (Some(tb), Some(frames)) => Some(time_to_millis(tb.calc_time(frames))),
            _ => None,
        };

        debug!(
            target: LOG_TARGET,
            "Decoder ready: track={}, codec={:?}, spec={:?}, duration_ms={:?}",
            track.id, track.codec_params.codec, spec, duration_millis
        );

        Ok(Self { format_reader, decoder, track_id: track.id, time_base, spec, duration_millis })
    }

    pub fn spec(&self) -> SignalSpec {
        self.spec
    }

    pub fn duration_millis(&self) -> Option<u64> {
        self.duration_millis
    }

    /// Seeks close to `position_millis` and returns where decoding resumes.
    pub fn seek(&mut self, position_millis: u64) -> Result<u64, RendererError> {
        let time = Time::new(position_millis / 1000, (position_millis % 1000) as f64 / 1000.0);
        let seeked = self
            .format_reader
            .seek(SeekMode::Accurate, SeekTo::Time { time, track_id: Some(self.track_id) })?;
        self.decoder.reset();
        let actual = self.ts_to_millis(seeked.actual_ts);
        debug!(target: LOG_TARGET, "Seeked to {} ms (requested {} ms).", actual, position_millis);
        Ok(actual)
    }

    /// Decodes the next packet of the selected track. Corrupt packets are skipped.
    pub fn next_chunk(&mut self, output_level: f32) -> Result<DecodedChunk, RendererError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!(target: LOG_TARGET, "End of stream reached.");
                    return Ok(DecodedChunk::EndOfStream);
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!(target: LOG_TARGET, "Decoder reset required, resetting.");
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                trace!(target: LOG_TARGET, "Skipping packet for track {}", packet.track_id());
                continue;
            }
            let timestamp_millis = self.ts_to_millis(packet.ts());

            match self.decoder.decode(&packet) {
                Ok(buffer) => {
                    if *buffer.spec() != self.spec {
                        return Err(RendererError::UnsupportedFormat(format!(
                            "Audio specification changed mid-stream: {:?}",
                            buffer.spec()
                        )));
                    }
                    let samples = sample_converter::interleave_s16(buffer, output_level);
                    return Ok(DecodedChunk::Samples { samples, timestamp_millis });
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    warn!(target: LOG_TARGET, "Decode error (skipping packet): {}", err);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn ts_to_millis(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) => time_to_millis(tb.calc_time(ts)),
            None => ts * 1000 / u64::from(self.spec.rate.max(1)),
        }
    }
}

fn time_to_millis(time: Time) -> u64 {
    time.seconds * 1000 + (time.frac * 1000.0) as u64
}
