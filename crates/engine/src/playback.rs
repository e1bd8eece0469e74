use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use looper_transport::LooperError;

use crate::backend::{AudioBackend, StreamHandle};
use crate::mix::OutputMixer;
use crate::tracks::TrackStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// Transport words shared between the control side and the output callback.
#[derive(Debug, Default)]
pub struct TransportShared {
    pub playing: AtomicBool,
    /// Frames played since the last start. Never wrapped; read modulo the loop.
    pub cursor: AtomicU64,
}

/// Owns the output stream and the play cursor.
pub struct PlaybackEngine {
    transport: Arc<TransportShared>,
    stream: Option<StreamHandle>,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(TransportShared::default()),
            stream: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        if self.stream.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        }
    }

    pub fn transport(&self) -> &Arc<TransportShared> {
        &self.transport
    }

    /// Start when stopped, stop when playing.
    ///
    /// Fails with `NoLoopDefined` while no track has been recorded, and with
    /// `DeviceUnavailable` if the output stream cannot be opened; both leave
    /// the engine stopped.
    pub fn toggle(
        &mut self,
        backend: &mut dyn AudioBackend,
        tracks: &Arc<TrackStore>,
    ) -> Result<PlaybackState, LooperError> {
        if tracks.master_len().is_none() {
            return Err(LooperError::NoLoopDefined);
        }

        match self.state() {
            PlaybackState::Stopped => {
                self.start(backend, tracks)?;
                Ok(PlaybackState::Playing)
            }
            PlaybackState::Playing => {
                self.stop();
                Ok(PlaybackState::Stopped)
            }
        }
    }

    fn start(
        &mut self,
        backend: &mut dyn AudioBackend,
        tracks: &Arc<TrackStore>,
    ) -> Result<(), LooperError> {
        self.transport.cursor.store(0, Ordering::Relaxed);
        self.transport.playing.store(true, Ordering::Release);

        let mut mixer = OutputMixer::new(tracks.clone(), self.transport.clone());
        match backend.open_output(Box::new(move |out: &mut [f32]| mixer.process(out))) {
            Ok(stream) => {
                self.stream = Some(stream);
                log::info!("Playback started");
                Ok(())
            }
            Err(err) => {
                self.transport.playing.store(false, Ordering::Release);
                log::error!("Failed to start playback: {err}");
                Err(err)
            }
        }
    }

    /// Silence output from the next callback on and close the stream.
    pub fn stop(&mut self) {
        self.transport.playing.store(false, Ordering::Release);
        if self.stream.take().is_some() {
            log::info!("Playback stopped");
        }
    }

    /// Current frame within the loop, while playing.
    pub fn position(&self, master_len: Option<usize>) -> Option<usize> {
        let master = master_len?;
        if !self.state().is_playing() {
            return None;
        }
        let cursor = self.transport.cursor.load(Ordering::Relaxed);
        Some((cursor % master as u64) as usize)
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}
