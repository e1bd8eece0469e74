use std::path::PathBuf;

/// Outcome of a rejected control operation.
///
/// Every variant leaves engine state exactly as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum LooperError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("recording captured no audio")]
    EmptyRecording,

    #[error("no loop defined yet, record a track first")]
    NoLoopDefined,

    #[error("track index {0} out of range")]
    InvalidTrack(usize),

    /// The thread collecting a take died; the take is lost.
    #[error("recorder thread failed: {0}")]
    RecorderFailed(String),

    #[error("Failed to export mix to '{path}': {source}")]
    Export {
        path: PathBuf,
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LooperError::InvalidTrack(7).to_string(),
            "track index 7 out of range"
        );
        assert_eq!(
            LooperError::RecorderFailed("worker panicked".into()).to_string(),
            "recorder thread failed: worker panicked"
        );
        assert!(
            LooperError::DeviceUnavailable("no input device found".into())
                .to_string()
                .contains("no input device found")
        );
    }

    #[test]
    fn test_export_error_keeps_path() {
        let err = LooperError::Export {
            path: PathBuf::from("/tmp/mix.wav"),
            source: anyhow::anyhow!("disk full"),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/mix.wav"));
        assert!(message.contains("disk full"));
    }
}
