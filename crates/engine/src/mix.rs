use std::sync::Arc;
use std::sync::atomic::Ordering;

use looper_transport::{CHANNELS, hard_clip};

use crate::playback::TransportShared;
use crate::tracks::TrackStore;

/// Output-callback half of playback.
///
/// Owned by the device stream. Every call fills the whole buffer: silence while
/// stopped or without a loop, otherwise the clipped sum of every audible track
/// read from the cursor position with wrap-around.
pub struct OutputMixer {
    tracks: Arc<TrackStore>,
    transport: Arc<TransportShared>,
    channels: usize,
}

impl OutputMixer {
    pub fn new(tracks: Arc<TrackStore>, transport: Arc<TransportShared>) -> Self {
        Self {
            tracks,
            transport,
            channels: CHANNELS as usize,
        }
    }

    /// Fill `out` (interleaved) with the next block. Never blocks or allocates.
    pub fn process(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        if !self.transport.playing.load(Ordering::Acquire) {
            return;
        }
        let Some(master) = self.tracks.master_len() else {
            return;
        };

        let frames = out.len() / self.channels;
        let cursor = self.transport.cursor.load(Ordering::Relaxed);
        let start = (cursor % master as u64) as usize;

        self.tracks.for_each_audible(|buffer, gain| {
            // A buffer of another length can only be seen mid-way through a
            // clear-all followed by a new first recording.
            if buffer.frames() == master {
                buffer.add_wrapped_into(start, out, gain);
            }
        });

        hard_clip(out);
        self.transport
            .cursor
            .store(cursor + frames as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Collector;
    use looper_transport::SampleBuffer;

    struct Fixture {
        _collector: Collector,
        tracks: Arc<TrackStore>,
        transport: Arc<TransportShared>,
        mixer: OutputMixer,
    }

    fn fixture() -> Fixture {
        let collector = Collector::new();
        let tracks = Arc::new(TrackStore::new(&collector.handle()));
        let transport = Arc::new(TransportShared::default());
        let mixer = OutputMixer::new(tracks.clone(), transport.clone());
        Fixture {
            _collector: collector,
            tracks,
            transport,
            mixer,
        }
    }

    /// Stereo buffer whose frame `i` is `[i / 100, -i / 100]`.
    fn numbered(frames: usize) -> SampleBuffer {
        let samples = (0..frames)
            .flat_map(|i| [i as f32 / 100.0, -(i as f32) / 100.0])
            .collect();
        SampleBuffer::stereo(samples)
    }

    fn constant(frames: usize, value: f32) -> SampleBuffer {
        SampleBuffer::stereo(vec![value; frames * 2])
    }

    fn play(f: &Fixture, cursor: u64) {
        f.transport.cursor.store(cursor, Ordering::Relaxed);
        f.transport.playing.store(true, Ordering::Release);
    }

    #[test]
    fn test_silence_when_stopped() {
        let mut f = fixture();
        f.tracks.commit(0, constant(10, 0.5), 10).unwrap();
        let mut out = vec![0.7; 8];

        f.mixer.process(&mut out);

        assert_eq!(out, vec![0.0; 8]);
        assert_eq!(f.transport.cursor.load(Ordering::Relaxed), 0, "cursor must not move");
    }

    #[test]
    fn test_silence_without_loop() {
        let mut f = fixture();
        play(&f, 0);
        let mut out = vec![0.7; 8];

        f.mixer.process(&mut out);

        assert_eq!(out, vec![0.0; 8]);
        assert_eq!(f.transport.cursor.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_wrap_at_loop_boundary() {
        let mut f = fixture();
        f.tracks.commit(0, numbered(10), 10).unwrap();
        f.tracks.set_gain(0, 0.5).unwrap();
        play(&f, 8);
        let mut out = vec![0.0; 5 * 2];

        f.mixer.process(&mut out);

        let expected: Vec<f32> = [8, 9, 0, 1, 2]
            .iter()
            .flat_map(|&i| [i as f32 / 100.0 * 0.5, -(i as f32) / 100.0 * 0.5])
            .collect();
        assert_eq!(out, expected);
        assert_eq!(f.transport.cursor.load(Ordering::Relaxed), 13);
    }

    #[test]
    fn test_cursor_is_stored_unwrapped() {
        let mut f = fixture();
        f.tracks.commit(0, numbered(10), 10).unwrap();
        play(&f, 0);
        let mut out = vec![0.0; 4 * 2];

        for _ in 0..5 {
            f.mixer.process(&mut out);
        }

        assert_eq!(f.transport.cursor.load(Ordering::Relaxed), 20);
        // 20 % 10 == 0, so the next block starts at frame 0 again
        f.mixer.process(&mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[2], 0.01);
    }

    #[test]
    fn test_request_longer_than_loop() {
        let mut f = fixture();
        f.tracks.commit(0, numbered(3), 3).unwrap();
        play(&f, 1);
        let mut out = vec![0.0; 7 * 2];

        f.mixer.process(&mut out);

        let left: Vec<f32> = out.iter().step_by(2).copied().collect();
        assert_eq!(left, vec![0.01, 0.02, 0.0, 0.01, 0.02, 0.0, 0.01]);
    }

    #[test]
    fn test_sum_is_hard_clipped() {
        let mut f = fixture();
        f.tracks.commit(0, constant(10, 0.9), 10).unwrap();
        f.tracks.commit(1, constant(10, 0.9), 10).unwrap();
        f.tracks.commit(2, constant(10, -0.9), 10).unwrap();
        f.tracks.commit(3, constant(10, -0.9), 10).unwrap();
        f.tracks.set_enabled(2, false).unwrap();
        f.tracks.set_enabled(3, false).unwrap();
        play(&f, 0);
        let mut out = vec![0.0; 4 * 2];

        f.mixer.process(&mut out);

        assert_eq!(out, vec![1.0; 8]);
    }

    #[test]
    fn test_mute_takes_effect_next_callback() {
        let mut f = fixture();
        f.tracks.commit(0, constant(10, 0.3), 10).unwrap();
        f.tracks.commit(1, constant(10, 0.2), 10).unwrap();
        play(&f, 0);
        let mut out = vec![0.0; 2 * 2];

        f.mixer.process(&mut out);
        assert!((out[0] - 0.5).abs() < 1e-6);

        f.tracks.set_enabled(0, false).unwrap();
        f.mixer.process(&mut out);
        assert_eq!(out, vec![0.2; 4], "muted track must not bleed");
    }

    #[test]
    fn test_stop_silences_next_callback() {
        let mut f = fixture();
        f.tracks.commit(0, constant(10, 0.3), 10).unwrap();
        play(&f, 0);
        let mut out = vec![0.0; 2 * 2];
        f.mixer.process(&mut out);

        f.transport.playing.store(false, Ordering::Release);
        f.mixer.process(&mut out);

        assert_eq!(out, vec![0.0; 4]);
    }

    #[test]
    fn test_cleared_track_drops_out() {
        let mut f = fixture();
        f.tracks.commit(0, constant(10, 0.3), 10).unwrap();
        f.tracks.commit(1, constant(10, 0.2), 10).unwrap();
        play(&f, 0);
        let mut out = vec![0.0; 2 * 2];

        f.tracks.clear(0).unwrap();
        f.mixer.process(&mut out);

        assert_eq!(out, vec![0.2; 4]);
    }

    #[test]
    fn test_buffer_swaps_are_never_torn() {
        use std::sync::atomic::AtomicBool;
        use std::thread;

        let Fixture {
            _collector: mut collector,
            tracks,
            transport,
            mut mixer,
        } = fixture();
        tracks.commit(0, constant(256, 0.25), 256).unwrap();
        transport.playing.store(true, Ordering::Release);

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let done = done.clone();
            thread::spawn(move || {
                let mut out = vec![0.0f32; 64 * 2];
                let mut blocks = 0usize;
                loop {
                    mixer.process(&mut out);
                    let first = out[0];
                    assert!(
                        [0.0, 0.25, 0.75].contains(&first),
                        "unexpected sample {first}"
                    );
                    assert!(
                        out.iter().all(|&s| s == first),
                        "block mixed two buffers"
                    );
                    blocks += 1;
                    if done.load(Ordering::Acquire) {
                        return blocks;
                    }
                }
            })
        };

        for round in 0..500 {
            match round % 3 {
                0 => tracks.commit(0, constant(256, 0.75), 256).unwrap(),
                1 => tracks.commit(0, constant(256, 0.25), 256).unwrap(),
                _ => tracks.clear(0).unwrap(),
            }
            collector.collect();
        }
        done.store(true, Ordering::Release);

        let blocks = reader.join().unwrap();
        assert!(blocks > 0);
    }
}
