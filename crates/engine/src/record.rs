use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use looper_transport::{CHANNELS, LooperError, SAMPLE_RATE, SampleBuffer, conform};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::DeviceStats;
use crate::backend::{AudioBackend, StreamHandle};
use crate::tracks::TrackStore;

/// How often the accumulation thread empties the hand-off ring.
const DRAIN_INTERVAL: Duration = Duration::from_millis(5);

/// Upper bound on the hand-off ring, one minute of audio.
pub const MAX_HANDOFF_FRAMES: usize = SAMPLE_RATE as usize * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Armed,
    Capturing,
    /// The last start failed to open the input device.
    Error,
}

/// Input-callback half of a recording.
///
/// Copies each delivered chunk into the hand-off ring. A chunk that does not
/// fit is dropped whole and counted; the callback never waits.
pub struct InputFeeder {
    producer: Producer<f32>,
    capturing: Arc<AtomicBool>,
    stats: Arc<DeviceStats>,
}

impl InputFeeder {
    pub fn process(&mut self, data: &[f32]) {
        if data.is_empty() || !self.capturing.load(Ordering::Acquire) {
            return;
        }
        if self.producer.slots() < data.len() {
            self.stats.record_dropped_chunk();
            return;
        }
        match self.producer.write_chunk_uninit(data.len()) {
            Ok(chunk) => {
                chunk.fill_from_iter(data.iter().copied());
            }
            Err(_) => self.stats.record_dropped_chunk(),
        }
    }
}

/// Chunks collected off the real-time thread.
struct Accumulator {
    consumer: Consumer<f32>,
    chunks: Vec<Vec<f32>>,
}

impl Accumulator {
    fn drain(&mut self) {
        let available = self.consumer.slots();
        if available == 0 {
            return;
        }
        if let Ok(chunk) = self.consumer.read_chunk(available) {
            let (first, second) = chunk.as_slices();
            let mut samples = Vec::with_capacity(available);
            samples.extend_from_slice(first);
            samples.extend_from_slice(second);
            chunk.commit_all();
            self.chunks.push(samples);
        }
    }
}

struct ActiveCapture {
    track: usize,
    stream: StreamHandle,
    running: Arc<AtomicBool>,
    worker: JoinHandle<Accumulator>,
    dropped_at_start: u64,
}

/// Outcome of a completed recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    pub track: usize,
    /// Frames actually captured, before conforming.
    pub captured_frames: usize,
    /// Loop length the track was conformed to.
    pub loop_frames: usize,
    /// Input chunks lost to a full hand-off ring during this pass.
    pub dropped_chunks: u64,
}

/// One recording pass at a time into a target track slot.
///
/// The input callback feeds a bounded SPSC ring; a named worker thread drains
/// it into the accumulator. Stopping closes the stream, drains what is left,
/// conforms the capture to the master loop and publishes it.
pub struct RecordingSession {
    state: RecordingState,
    capacity: usize,
    capturing: Arc<AtomicBool>,
    stats: Arc<DeviceStats>,
    active: Option<ActiveCapture>,
}

impl RecordingSession {
    /// `capacity_frames` bounds the hand-off ring between the input callback
    /// and the accumulation thread. Clamped to `1..=MAX_HANDOFF_FRAMES`.
    pub fn new(capacity_frames: usize, stats: Arc<DeviceStats>) -> Self {
        Self {
            state: RecordingState::Idle,
            capacity: capacity_frames
                .clamp(1, MAX_HANDOFF_FRAMES)
                .saturating_mul(CHANNELS as usize),
            capturing: Arc::new(AtomicBool::new(false)),
            stats,
            active: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == RecordingState::Capturing
    }

    /// Track being recorded, while capturing.
    pub fn target(&self) -> Option<usize> {
        self.active.as_ref().map(|active| active.track)
    }

    pub fn start(
        &mut self,
        track: usize,
        backend: &mut dyn AudioBackend,
        tracks: &TrackStore,
    ) -> Result<(), LooperError> {
        if self.is_capturing() {
            return Err(LooperError::AlreadyRecording);
        }
        tracks.check_index(track)?;

        self.state = RecordingState::Armed;
        let (producer, consumer) = RingBuffer::<f32>::new(self.capacity);
        let mut feeder = InputFeeder {
            producer,
            capturing: self.capturing.clone(),
            stats: self.stats.clone(),
        };

        let stream = match backend.open_input(Box::new(move |data: &[f32]| feeder.process(data))) {
            Ok(stream) => stream,
            Err(err) => {
                self.state = RecordingState::Error;
                log::error!("Error starting recording: {err}");
                return Err(err);
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let worker = match spawn_accumulator(consumer, running.clone()) {
            Ok(worker) => worker,
            Err(err) => {
                drop(stream);
                self.state = RecordingState::Error;
                log::error!("Failed to spawn recorder thread: {err}");
                return Err(LooperError::DeviceUnavailable(format!(
                    "recorder thread: {err}"
                )));
            }
        };

        self.active = Some(ActiveCapture {
            track,
            stream,
            running,
            worker,
            dropped_at_start: self.stats.dropped_chunks(),
        });
        self.capturing.store(true, Ordering::Release);
        self.state = RecordingState::Capturing;
        log::info!("Recording track {}", track + 1);
        Ok(())
    }

    /// Finish the pass and commit it to the target track.
    ///
    /// Returns `Ok(None)` when nothing was being captured. A pass that captured
    /// no frames fails with `EmptyRecording` and leaves the track untouched.
    pub fn stop(&mut self, tracks: &TrackStore) -> Result<Option<Recorded>, LooperError> {
        let Some(active) = self.active.take() else {
            self.state = RecordingState::Idle;
            return Ok(None);
        };

        self.capturing.store(false, Ordering::Release);
        drop(active.stream);
        active.running.store(false, Ordering::Release);
        self.state = RecordingState::Idle;

        let mut accumulator = join_accumulator(active.worker)?;
        accumulator.drain();

        let dropped_chunks = self.stats.dropped_chunks() - active.dropped_at_start;
        if dropped_chunks > 0 {
            log::warn!("Recording dropped {dropped_chunks} input chunks");
        }

        let captured = SampleBuffer::from_chunks(&accumulator.chunks, SAMPLE_RATE, CHANNELS);
        let captured_frames = captured.frames();
        let (buffer, loop_frames) = match conform(captured, tracks.master_len()) {
            Ok(conformed) => conformed,
            Err(err) => {
                log::warn!("Recording on track {} captured no audio", active.track + 1);
                return Err(err);
            }
        };
        tracks.commit(active.track, buffer, loop_frames)?;

        log::info!(
            "Recording stopped: track {} captured {} frames, loop is {} frames",
            active.track + 1,
            captured_frames,
            loop_frames
        );

        Ok(Some(Recorded {
            track: active.track,
            captured_frames,
            loop_frames,
            dropped_chunks,
        }))
    }
}

impl Drop for RecordingSession {
    /// Abandon any pass in progress so the worker thread exits.
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            self.capturing.store(false, Ordering::Release);
            drop(active.stream);
            active.running.store(false, Ordering::Release);
            let _ = active.worker.join();
        }
    }
}

fn join_accumulator(worker: JoinHandle<Accumulator>) -> Result<Accumulator, LooperError> {
    worker.join().map_err(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panicked".to_string());
        log::error!("Recorder thread died, discarding take: {reason}");
        LooperError::RecorderFailed(reason)
    })
}

fn spawn_accumulator(
    consumer: Consumer<f32>,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<Accumulator>> {
    thread::Builder::new()
        .name("looper-record".to_string())
        .spawn(move || {
            let mut accumulator = Accumulator {
                consumer,
                chunks: Vec::new(),
            };
            while running.load(Ordering::Acquire) {
                accumulator.drain();
                thread::sleep(DRAIN_INTERVAL);
            }
            accumulator
        })
}
