use std::path::{Path, PathBuf};
use std::sync::Arc;

use basedrop::Collector;
use looper_engine::{
    AudioBackend, CpalBackend, DeviceSelection, DeviceStats, PlaybackEngine, PlaybackState,
    Recorded, RecordingSession, TrackBuffer, TrackStore,
};
use looper_render::{MixSource, render_mix, write_wav};
use looper_transport::{
    CHANNELS, LooperError, SAMPLE_RATE, SampleBuffer, WAVEFORM_DECIMATION, Waveform,
};

/// Engine settings supplied by whoever builds the looper.
#[derive(Debug, Clone)]
pub struct LooperOptions {
    pub devices: DeviceSelection,
    /// Capacity of the input hand-off ring, in frames.
    pub handoff_frames: usize,
    /// Relative export names are resolved against this directory.
    pub export_dir: PathBuf,
}

impl Default for LooperOptions {
    fn default() -> Self {
        Self {
            devices: DeviceSelection::default(),
            handoff_frames: SAMPLE_RATE as usize * 2,
            export_dir: PathBuf::from("."),
        }
    }
}

/// A four-track looper: one engine instance, driven from a control thread.
///
/// The device callbacks only ever see the shared `TrackStore` and the
/// transport atomics; everything else here runs on the caller's thread.
pub struct Looper {
    recorder: RecordingSession,
    playback: PlaybackEngine,
    tracks: Arc<TrackStore>,
    backend: Box<dyn AudioBackend>,
    stats: Arc<DeviceStats>,
    reported_drops: u64,
    reported_errors: u64,
    export_dir: PathBuf,
    // Declared last so every `Shared` above is released before it goes.
    collector: Collector,
}

impl Looper {
    /// Looper on the system's sound devices.
    pub fn new(options: LooperOptions) -> Self {
        let stats = Arc::new(DeviceStats::new());
        let backend = CpalBackend::new(options.devices.clone(), stats.clone());
        Self::build(Box::new(backend), stats, options)
    }

    /// Looper on a caller-provided device boundary. `stats` must be the
    /// counters the backend reports into, so `poll` can surface them.
    pub fn with_backend(
        backend: Box<dyn AudioBackend>,
        stats: Arc<DeviceStats>,
        options: LooperOptions,
    ) -> Self {
        Self::build(backend, stats, options)
    }

    fn build(
        backend: Box<dyn AudioBackend>,
        stats: Arc<DeviceStats>,
        options: LooperOptions,
    ) -> Self {
        let collector = Collector::new();
        let tracks = Arc::new(TrackStore::new(&collector.handle()));

        Self {
            recorder: RecordingSession::new(options.handoff_frames, stats.clone()),
            playback: PlaybackEngine::new(),
            tracks,
            backend,
            stats,
            reported_drops: 0,
            reported_errors: 0,
            export_dir: options.export_dir,
            collector,
        }
    }

    pub fn record_start(&mut self, track: usize) -> Result<(), LooperError> {
        self.collector.collect();
        self.recorder
            .start(track, self.backend.as_mut(), &self.tracks)
    }

    /// Stop the current pass and commit it. `Ok(None)` if nothing was recording.
    pub fn record_stop(&mut self) -> Result<Option<Recorded>, LooperError> {
        let result = self.recorder.stop(&self.tracks);
        self.collector.collect();
        result
    }

    pub fn play_toggle(&mut self) -> Result<PlaybackState, LooperError> {
        self.playback.toggle(self.backend.as_mut(), &self.tracks)
    }

    pub fn mute(&mut self, track: usize, muted: bool) -> Result<(), LooperError> {
        self.tracks.set_enabled(track, !muted)
    }

    /// Flip a track between muted and enabled. Returns the new enabled flag.
    pub fn toggle_mute(&mut self, track: usize) -> Result<bool, LooperError> {
        let enabled = !self.tracks.is_enabled(track)?;
        self.tracks.set_enabled(track, enabled)?;
        Ok(enabled)
    }

    /// Volume slider position, 0..=100, mapped linearly onto gain 0.0..=1.0.
    pub fn set_volume(&mut self, track: usize, percent: u8) -> Result<(), LooperError> {
        self.tracks
            .set_gain(track, f32::from(percent.min(100)) / 100.0)
    }

    pub fn set_gain(&mut self, track: usize, gain: f32) -> Result<(), LooperError> {
        self.tracks.set_gain(track, gain)
    }

    /// Empty a track. Emptying the last one removes the loop, and playback
    /// stops since there is nothing left to play against.
    pub fn clear_track(&mut self, track: usize) -> Result<(), LooperError> {
        self.tracks.clear(track)?;
        if self.tracks.master_len().is_none() && self.playback.state().is_playing() {
            log::info!("All tracks cleared, stopping playback");
            self.playback.stop();
        }
        self.collector.collect();
        Ok(())
    }

    /// Full-loop mixdown of every enabled track.
    pub fn render_mix(&self) -> Result<SampleBuffer, LooperError> {
        let audible = self.tracks.audible();
        let sources: Vec<MixSource<'_>> = audible
            .iter()
            .map(|(buffer, gain)| MixSource {
                buffer,
                gain: *gain,
            })
            .collect();
        render_mix(&sources, self.tracks.master_len(), SAMPLE_RATE, CHANNELS)
    }

    /// Render the mix and write it as 16-bit WAV. `.wav` is appended when
    /// missing; relative names land in the export directory.
    pub fn export_mix(&self, name: &str) -> Result<PathBuf, LooperError> {
        let mix = self.render_mix()?;
        let path = self.export_path(name);

        write_wav(&mix, &path).map_err(|source| LooperError::Export {
            path: path.clone(),
            source,
        })?;

        log::info!("Saved mix to: {}", path.display());
        Ok(path)
    }

    fn export_path(&self, name: &str) -> PathBuf {
        let file_name = if name.ends_with(".wav") {
            name.to_string()
        } else {
            format!("{name}.wav")
        };
        let path = Path::new(&file_name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.export_dir.join(path)
        }
    }

    /// Display points for a track; empty when the slot holds nothing.
    pub fn waveform(&self, track: usize) -> Result<Waveform, LooperError> {
        Ok(match self.tracks.snapshot(track)? {
            Some(buffer) => Waveform::from_buffer(&buffer, WAVEFORM_DECIMATION),
            None => Waveform {
                points: Vec::new(),
                decimation: WAVEFORM_DECIMATION,
            },
        })
    }

    pub fn snapshot(&self, track: usize) -> Result<Option<TrackBuffer>, LooperError> {
        self.tracks.snapshot(track)
    }

    pub fn loop_length(&self) -> Option<usize> {
        self.tracks.master_len()
    }

    pub fn loop_length_secs(&self) -> Option<f64> {
        self.loop_length()
            .map(|frames| frames as f64 / SAMPLE_RATE as f64)
    }

    pub fn track_enabled(&self, track: usize) -> Result<bool, LooperError> {
        self.tracks.is_enabled(track)
    }

    pub fn track_gain(&self, track: usize) -> Result<f32, LooperError> {
        self.tracks.gain(track)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_capturing()
    }

    pub fn recording_track(&self) -> Option<usize> {
        self.recorder.target()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.state().is_playing()
    }

    /// Frame within the loop currently being played.
    pub fn position(&self) -> Option<usize> {
        self.playback.position(self.tracks.master_len())
    }

    pub fn stats(&self) -> &DeviceStats {
        &self.stats
    }

    /// Periodic housekeeping from the control thread: frees buffers released
    /// by the audio callbacks and reports device faults. Returns the playback
    /// position.
    pub fn poll(&mut self) -> Option<usize> {
        self.collector.collect();

        let drops = self.stats.dropped_chunks();
        if drops > self.reported_drops {
            log::warn!(
                "Input hand-off full, {} chunks dropped",
                drops - self.reported_drops
            );
            self.reported_drops = drops;
        }
        let errors = self.stats.stream_errors();
        if errors > self.reported_errors {
            log::warn!(
                "{} audio stream errors since last poll",
                errors - self.reported_errors
            );
            self.reported_errors = errors;
        }

        self.position()
    }
}
