use std::path::Path;

use looper_transport::{LooperError, SampleBuffer, hard_clip};

/// One track's contribution to an offline mixdown.
#[derive(Debug, Clone, Copy)]
pub struct MixSource<'a> {
    pub buffer: &'a SampleBuffer,
    pub gain: f32,
}

/// Sum every source over one full loop, scaled by gain, then hard clip.
///
/// Same formula as the real-time mix but starting at frame 0 and covering the
/// whole loop, so no wrap handling is needed. Sources whose length differs
/// from `master_len` are skipped.
pub fn render_mix(
    sources: &[MixSource<'_>],
    master_len: Option<usize>,
    sample_rate: u32,
    channels: u16,
) -> Result<SampleBuffer, LooperError> {
    let master_len = master_len.ok_or(LooperError::NoLoopDefined)?;
    let mut samples = vec![0.0f32; master_len * channels as usize];

    for source in sources {
        if source.buffer.frames() != master_len || source.buffer.channels() != channels {
            continue;
        }
        for (dst, src) in samples.iter_mut().zip(source.buffer.samples()) {
            *dst += src * source.gain;
        }
    }

    hard_clip(&mut samples);
    Ok(SampleBuffer::new(samples, sample_rate, channels))
}

/// Convert a float sample to 16-bit PCM: `round(clip(x) * 32767)`.
#[inline]
pub fn to_pcm16(sample: f32) -> i16 {
    // `as` saturates, covering the clip for out-of-range input.
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Write a buffer as 16-bit signed PCM RIFF/WAVE.
pub fn write_wav(buffer: &SampleBuffer, path: &Path) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in buffer.samples() {
        writer.write_sample(to_pcm16(sample))?;
    }

    writer.finalize()?;
    Ok(())
}
