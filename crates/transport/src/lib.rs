mod conform;
mod error;

pub use conform::conform;
pub use error::LooperError;

/// Fixed sample rate of every buffer, stream and export in the looper.
pub const SAMPLE_RATE: u32 = 44100;

/// Interleaved channel count (stereo).
pub const CHANNELS: u16 = 2;

/// Number of track slots.
pub const TRACK_COUNT: usize = 4;

/// Every Nth frame is kept when building a waveform for display.
pub const WAVEFORM_DECIMATION: usize = 500;

/// Owned, fixed-length block of interleaved audio.
///
/// Frames are stored interleaved ([L, R, L, R, ...] for stereo). Once a buffer
/// is committed to a track slot it is never mutated again; a new recording
/// replaces the whole buffer.
///
/// # Examples
///
/// ```
/// use looper_transport::SampleBuffer;
///
/// let buffer = SampleBuffer::new(vec![0.0, 0.1, 0.2, 0.3], 44100, 2);
/// assert_eq!(buffer.frames(), 2);
/// assert_eq!(buffer.frame(1), &[0.2, 0.3]);
/// ```
#[derive(Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl SampleBuffer {
    /// Create a buffer from interleaved samples.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is 0 or if `samples.len()` is not divisible by `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Stereo buffer at the looper's fixed rate.
    pub fn stereo(samples: Vec<f32>) -> Self {
        Self::new(samples, SAMPLE_RATE, CHANNELS)
    }

    /// Silent buffer of `frames` frames.
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self::new(
            vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
        )
    }

    /// Concatenate captured chunks into one buffer.
    ///
    /// A trailing partial frame (a chunk boundary that split a frame) is dropped.
    pub fn from_chunks(chunks: &[Vec<f32>], sample_rate: u32, channels: u16) -> Self {
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut samples = Vec::with_capacity(total);
        for chunk in chunks {
            samples.extend_from_slice(chunk);
        }
        samples.truncate(total - total % channels.max(1) as usize);
        Self::new(samples, sample_rate, channels)
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Samples of a single frame.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.frames()`.
    pub fn frame(&self, index: usize) -> &[f32] {
        let channels = self.channels as usize;
        &self.samples[index * channels..(index + 1) * channels]
    }

    /// Interleaved samples of the frame range `start..end`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn frame_slice(&self, start: usize, end: usize) -> &[f32] {
        let channels = self.channels as usize;
        &self.samples[start * channels..end * channels]
    }

    /// Keep only the first `frames` frames.
    pub fn truncated(mut self, frames: usize) -> Self {
        self.samples.truncate(frames * self.channels as usize);
        self
    }

    /// Add this buffer, scaled by `gain`, into `out`, reading periodically
    /// from frame `start_frame`.
    ///
    /// `out` is interleaved with the same channel count. Reading wraps to
    /// frame 0 each time the end of the buffer is reached, as many times as
    /// needed to fill `out`. Does not allocate.
    pub fn add_wrapped_into(&self, start_frame: usize, out: &mut [f32], gain: f32) {
        let frames = self.frames();
        if frames == 0 {
            return;
        }

        let mut pos = (start_frame % frames) * self.channels as usize;
        let mut written = 0;
        while written < out.len() {
            let n = (self.samples.len() - pos).min(out.len() - written);
            for (dst, src) in out[written..written + n]
                .iter_mut()
                .zip(&self.samples[pos..pos + n])
            {
                *dst += src * gain;
            }
            written += n;
            pos = 0;
        }
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}

/// Hard clip every sample to [-1.0, 1.0].
#[inline]
pub fn hard_clip(samples: &mut [f32]) {
    for sample in samples {
        *sample = sample.clamp(-1.0, 1.0);
    }
}

/// Decimated display data for one track: `(seconds, amplitude)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    pub points: Vec<(f32, f32)>,
    pub decimation: usize,
}

impl Waveform {
    /// Take the first channel of every `decimation`-th frame.
    ///
    /// # Examples
    ///
    /// ```
    /// use looper_transport::{SampleBuffer, Waveform};
    ///
    /// let buffer = SampleBuffer::new(vec![0.5; 44100 * 2], 44100, 2);
    /// let waveform = Waveform::from_buffer(&buffer, 500);
    /// assert_eq!(waveform.points.len(), 89);
    /// ```
    pub fn from_buffer(buffer: &SampleBuffer, decimation: usize) -> Self {
        let decimation = decimation.max(1);
        let sample_rate = buffer.sample_rate() as f32;
        let points = (0..buffer.frames())
            .step_by(decimation)
            .map(|frame| (frame as f32 / sample_rate, buffer.frame(frame)[0]))
            .collect();

        Self { points, decimation }
    }
}
