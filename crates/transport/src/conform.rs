//! Pure conforming of a fresh capture to the master loop length.

use crate::{LooperError, SampleBuffer};

/// Fit `captured` to the master loop.
///
/// * No master yet: the capture becomes the loop, unchanged.
/// * Capture at least as long as the master: keep the first `master` frames.
/// * Shorter capture: repeat it end-to-start until `master` frames exist.
///   Frame `k` of the result is frame `k % captured.frames()` of the capture,
///   so a length that does not divide the master leaves a seam.
///
/// Returns the conformed buffer together with the (possibly new) master length.
pub fn conform(
    captured: SampleBuffer,
    master: Option<usize>,
) -> Result<(SampleBuffer, usize), LooperError> {
    let captured_frames = captured.frames();
    if captured_frames == 0 {
        return Err(LooperError::EmptyRecording);
    }

    let Some(master) = master else {
        return Ok((captured, captured_frames));
    };

    if captured_frames >= master {
        return Ok((captured.truncated(master), master));
    }

    let sample_rate = captured.sample_rate();
    let channels = captured.channels();
    let samples: Vec<f32> = captured
        .samples()
        .iter()
        .copied()
        .cycle()
        .take(master * channels as usize)
        .collect();

    Ok((SampleBuffer::new(samples, sample_rate, channels), master))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SAMPLE_RATE;

    /// Stereo buffer whose frame `i` is `[i, i + 0.5]`.
    fn numbered(frames: usize) -> SampleBuffer {
        let samples = (0..frames)
            .flat_map(|i| [i as f32, i as f32 + 0.5])
            .collect();
        SampleBuffer::stereo(samples)
    }

    #[test]
    fn test_first_recording_is_identity() {
        let captured = numbered(7);
        let (conformed, master) = conform(captured.clone(), None).unwrap();

        assert_eq!(master, 7);
        assert_eq!(conformed, captured);
    }

    #[test]
    fn test_empty_capture_rejected() {
        let empty = SampleBuffer::stereo(vec![]);

        assert!(matches!(
            conform(empty.clone(), None),
            Err(LooperError::EmptyRecording)
        ));
        assert!(matches!(
            conform(empty, Some(10)),
            Err(LooperError::EmptyRecording)
        ));
    }

    #[test]
    fn test_length_always_matches_master() {
        for captured_len in 1..=25 {
            for master in 1..=12 {
                let (conformed, new_master) = conform(numbered(captured_len), Some(master)).unwrap();
                assert_eq!(
                    conformed.frames(),
                    master,
                    "captured {captured_len} frames against master {master}"
                );
                assert_eq!(new_master, master);
            }
        }
    }

    #[test]
    fn test_longer_capture_is_truncated() {
        let captured = numbered(15);
        let (conformed, _) = conform(captured.clone(), Some(10)).unwrap();

        assert_eq!(conformed.samples(), captured.frame_slice(0, 10));
    }

    #[test]
    fn test_equal_length_is_identity() {
        let captured = numbered(10);
        let (conformed, _) = conform(captured.clone(), Some(10)).unwrap();

        assert_eq!(conformed, captured);
    }

    #[test]
    fn test_shorter_capture_is_tiled() {
        let captured = numbered(3);
        let (conformed, _) = conform(captured.clone(), Some(10)).unwrap();

        for k in 0..10 {
            assert_eq!(
                conformed.frame(k),
                captured.frame(k % 3),
                "frame {k} should repeat captured frame {}",
                k % 3
            );
        }
    }

    #[test]
    fn test_conform_keeps_format() {
        let captured = SampleBuffer::new(vec![0.1; 6], SAMPLE_RATE, 2);
        let (conformed, _) = conform(captured, Some(5)).unwrap();

        assert_eq!(conformed.sample_rate(), SAMPLE_RATE);
        assert_eq!(conformed.channels(), 2);
    }
}
