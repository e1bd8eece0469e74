pub mod session;

pub use session::{Looper, LooperOptions};

pub use looper_engine::{
    AudioBackend, DeviceSelection, DeviceStats, MAX_HANDOFF_FRAMES, ManualBackend, PlaybackState,
    Recorded, RecordingState, TrackBuffer,
};
pub use looper_render::{render_mix, to_pcm16, write_wav};
pub use looper_transport::{
    CHANNELS, LooperError, SAMPLE_RATE, SampleBuffer, TRACK_COUNT, WAVEFORM_DECIMATION, Waveform,
    conform,
};
