use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use looper_core::{DeviceSelection, LooperOptions, MAX_HANDOFF_FRAMES, SAMPLE_RATE};

fn default_handoff_seconds() -> f32 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Input device name; the host default when unset.
    #[serde(default)]
    pub input_device: Option<String>,
    #[serde(default)]
    pub output_device: Option<String>,
    /// Size of the recording hand-off ring.
    #[serde(default = "default_handoff_seconds")]
    pub handoff_seconds: f32,
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            handoff_seconds: default_handoff_seconds(),
            export_dir: None,
        }
    }
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("looper").join("config.toml"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed config {}: {err}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Err(err) = self.save_to(&path) {
            log::warn!("Could not save config to {}: {err:#}", path.display());
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn to_options(&self) -> LooperOptions {
        let max_seconds = MAX_HANDOFF_FRAMES as f32 / SAMPLE_RATE as f32;
        let seconds = if !(self.handoff_seconds.is_finite() && self.handoff_seconds > 0.0) {
            log::warn!(
                "Invalid handoff_seconds {}, using {}",
                self.handoff_seconds,
                default_handoff_seconds()
            );
            default_handoff_seconds()
        } else if self.handoff_seconds > max_seconds {
            log::warn!(
                "handoff_seconds {} is too large, using {max_seconds}",
                self.handoff_seconds
            );
            max_seconds
        } else {
            self.handoff_seconds
        };
        let defaults = LooperOptions::default();

        LooperOptions {
            devices: DeviceSelection {
                input: self.input_device.clone(),
                output: self.output_device.clone(),
            },
            handoff_frames: (seconds * SAMPLE_RATE as f32).ceil() as usize,
            export_dir: self.export_dir.clone().unwrap_or(defaults.export_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml"));
        assert_eq!(config, Config::default());
        assert_eq!(config.handoff_seconds, 2.0);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "output_device = \"Speakers\"\n").unwrap();

        let config = Config::load_from(&path);

        assert_eq!(config.output_device.as_deref(), Some("Speakers"));
        assert_eq!(config.input_device, None);
        assert_eq!(config.handoff_seconds, 2.0);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "handoff_seconds = \"lots\"").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            input_device: Some("USB Interface".into()),
            output_device: None,
            handoff_seconds: 0.5,
            export_dir: Some(PathBuf::from("/tmp/mixes")),
        };

        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_to_options() {
        let config = Config {
            input_device: Some("Mic".into()),
            handoff_seconds: 1.0,
            ..Config::default()
        };

        let options = config.to_options();

        assert_eq!(options.devices.input.as_deref(), Some("Mic"));
        assert_eq!(options.devices.output, None);
        assert_eq!(options.handoff_frames, 44100);
        assert_eq!(options.export_dir, PathBuf::from("."));
    }

    #[test]
    fn test_invalid_handoff_falls_back() {
        let config = Config {
            handoff_seconds: -3.0,
            ..Config::default()
        };
        assert_eq!(config.to_options().handoff_frames, 88200);
    }

    #[test]
    fn test_huge_handoff_is_clamped() {
        for handoff_seconds in [61.0, 50_000.0, 1e30] {
            let config = Config {
                handoff_seconds,
                ..Config::default()
            };
            assert_eq!(
                config.to_options().handoff_frames,
                MAX_HANDOFF_FRAMES,
                "{handoff_seconds} s"
            );
        }
    }
}
