use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use tracing::trace;

const LOG_TARGET: &str = "r_mymusic::audio::sample_converter";

/// Converts any decoded buffer to interleaved S16 at `output_level`.
pub fn interleave_s16(buffer: AudioBufferRef<'_>, output_level: f32) -> Vec<i16> {
    let spec = *buffer.spec();
    let frames = buffer.frames();
    trace!(target: LOG_TARGET, "Converting {} frames ({} channels) to S16", frames, spec.channels.count());

    let mut samples = SampleBuffer::<i16>::new(buffer.capacity() as u64, spec);
    samples.copy_interleaved_ref(buffer);
    let mut out = samples.samples().to_vec();
    apply_output_level(&mut out, output_level);
    out
}

/// Scales samples in place. Levels are clamped to `[0.0, 1.0]`; full scale is a no-op.
pub fn apply_output_level(samples: &mut [i16], level: f32) {
    let level = clamp_level(level);
    if level >= 1.0 {
        return;
    }
    for sample in samples.iter_mut() {
        *sample = (*sample as f32 * level).round() as i16;
    }
}

pub fn clamp_level(level: f32) -> f32 {
    if level.is_nan() {
        return 1.0;
    }
    level.clamp(0.0, 1.0)
}
