//! Device boundary.
//!
//! The engine never talks to hardware directly: it hands a callback to an
//! [`AudioBackend`] and keeps the returned [`StreamHandle`] for as long as the
//! stream should run. Both callbacks deal in interleaved stereo `f32` frames
//! at the looper's fixed sample rate.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};

use looper_transport::LooperError;

/// Called with each captured chunk. Chunk size may vary call to call.
pub type InputCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Called with the buffer the device wants filled next.
pub type OutputCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// An open stream. Dropping the handle stops and closes it.
pub struct StreamHandle {
    _stream: Box<dyn Any>,
}

impl StreamHandle {
    pub fn new(stream: impl Any) -> Self {
        Self {
            _stream: Box::new(stream),
        }
    }
}

pub trait AudioBackend {
    /// Open and start the capture stream.
    fn open_input(&mut self, callback: InputCallback) -> Result<StreamHandle, LooperError>;

    /// Open and start the playback stream.
    fn open_output(&mut self, callback: OutputCallback) -> Result<StreamHandle, LooperError>;
}

#[derive(Default)]
struct ManualState {
    input: Option<InputCallback>,
    output: Option<OutputCallback>,
    unavailable: bool,
}

/// Backend driven by the caller instead of a sound card.
///
/// Clones share the same state: hand one clone to the engine and keep another
/// to push captured samples in and pull mixed blocks out. Useful for headless
/// rendering and for exercising the engine without hardware.
#[derive(Clone, Default)]
pub struct ManualBackend {
    state: Arc<Mutex<ManualState>>,
}

enum Direction {
    Input,
    Output,
}

struct ManualStream {
    state: Arc<Mutex<ManualState>>,
    direction: Direction,
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        match self.direction {
            Direction::Input => state.input = None,
            Direction::Output => state.output = None,
        }
    }
}

fn lock(state: &Mutex<ManualState>) -> MutexGuard<'_, ManualState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable, every open fails with `DeviceUnavailable`.
    pub fn set_available(&self, available: bool) {
        lock(&self.state).unavailable = !available;
    }

    pub fn input_open(&self) -> bool {
        lock(&self.state).input.is_some()
    }

    pub fn output_open(&self) -> bool {
        lock(&self.state).output.is_some()
    }

    /// Deliver captured samples. Returns `false` if no input stream is open.
    pub fn push_input(&self, samples: &[f32]) -> bool {
        match lock(&self.state).input.as_mut() {
            Some(callback) => {
                callback(samples);
                true
            }
            None => false,
        }
    }

    /// Request the next output block. Without an open output stream `out` is
    /// filled with silence and `false` is returned.
    pub fn pull_output(&self, out: &mut [f32]) -> bool {
        match lock(&self.state).output.as_mut() {
            Some(callback) => {
                callback(out);
                true
            }
            None => {
                out.fill(0.0);
                false
            }
        }
    }

    fn open(&self, direction: Direction) -> Result<ManualStream, LooperError> {
        if lock(&self.state).unavailable {
            return Err(LooperError::DeviceUnavailable(
                "manual device disabled".to_string(),
            ));
        }
        Ok(ManualStream {
            state: self.state.clone(),
            direction,
        })
    }
}

impl AudioBackend for ManualBackend {
    fn open_input(&mut self, callback: InputCallback) -> Result<StreamHandle, LooperError> {
        let stream = self.open(Direction::Input)?;
        lock(&self.state).input = Some(callback);
        Ok(StreamHandle::new(stream))
    }

    fn open_output(&mut self, callback: OutputCallback) -> Result<StreamHandle, LooperError> {
        let stream = self.open(Direction::Output)?;
        lock(&self.state).output = Some(callback);
        Ok(StreamHandle::new(stream))
    }
}
