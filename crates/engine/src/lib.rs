//! Real-time side of the looper.
//!
//! Two device contexts call into this crate at hardware cadence: the input
//! callback ([`InputFeeder`]) and the output callback ([`OutputMixer`]).
//! Neither blocks, logs or frees memory. Control operations run on an ordinary
//! thread and talk to the callbacks only through atomics, the lock-free
//! hand-off ring and `basedrop` cells.

mod backend;
mod cpal_backend;
mod mix;
mod playback;
mod record;
mod tracks;

use std::sync::atomic::{AtomicU64, Ordering};

pub use backend::{AudioBackend, InputCallback, ManualBackend, OutputCallback, StreamHandle};
pub use cpal_backend::{CpalBackend, DeviceSelection};
pub use mix::OutputMixer;
pub use playback::{PlaybackEngine, PlaybackState, TransportShared};
pub use record::{InputFeeder, MAX_HANDOFF_FRAMES, Recorded, RecordingSession, RecordingState};
pub use tracks::{TrackBuffer, TrackStore};

/// Fault counters written from device contexts and read by the control side.
#[derive(Debug, Default)]
pub struct DeviceStats {
    dropped_chunks: AtomicU64,
    stream_errors: AtomicU64,
}

impl DeviceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input chunk discarded because the hand-off ring was full.
    #[inline]
    pub fn record_dropped_chunk(&self) {
        self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
    }

    /// Device reported an error (xrun, disconnect, ...).
    #[inline]
    pub fn record_stream_error(&self) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }

    pub fn stream_errors(&self) -> u64 {
        self.stream_errors.load(Ordering::Relaxed)
    }
}
