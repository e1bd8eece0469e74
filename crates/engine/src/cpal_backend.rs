use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use looper_transport::{CHANNELS, LooperError, SAMPLE_RATE};

use crate::DeviceStats;
use crate::backend::{AudioBackend, InputCallback, OutputCallback, StreamHandle};

/// Which devices to open, by name. `None` picks the host default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSelection {
    pub input: Option<String>,
    pub output: Option<String>,
}

/// Sound-card backend on the default cpal host.
pub struct CpalBackend {
    host: cpal::Host,
    selection: DeviceSelection,
    stats: Arc<DeviceStats>,
}

impl CpalBackend {
    pub fn new(selection: DeviceSelection, stats: Arc<DeviceStats>) -> Self {
        Self {
            host: cpal::default_host(),
            selection,
            stats,
        }
    }

    fn input_device(&self) -> anyhow::Result<cpal::Device> {
        match &self.selection.input {
            Some(name) => find_by_name(self.host.input_devices()?, name),
            None => self
                .host
                .default_input_device()
                .ok_or_else(|| anyhow::anyhow!("no input device found")),
        }
    }

    fn output_device(&self) -> anyhow::Result<cpal::Device> {
        match &self.selection.output {
            Some(name) => find_by_name(self.host.output_devices()?, name),
            None => self
                .host
                .default_output_device()
                .ok_or_else(|| anyhow::anyhow!("no output device found")),
        }
    }

    fn build_input(&self, mut callback: InputCallback) -> anyhow::Result<cpal::Stream> {
        let device = self.input_device()?;
        if !supports_looper_format(device.supported_input_configs()?) {
            anyhow::bail!("input device does not support {SAMPLE_RATE} Hz stereo f32");
        }

        let stats = self.stats.clone();
        let stream = device.build_input_stream(
            &stream_config(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| callback(data),
            move |err| {
                stats.record_stream_error();
                log::error!("input stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        log::info!("Opened input device {}", device_label(&device));
        Ok(stream)
    }

    fn build_output(&self, mut callback: OutputCallback) -> anyhow::Result<cpal::Stream> {
        let device = self.output_device()?;
        if !supports_looper_format(device.supported_output_configs()?) {
            anyhow::bail!("output device does not support {SAMPLE_RATE} Hz stereo f32");
        }

        let stats = self.stats.clone();
        let stream = device.build_output_stream(
            &stream_config(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| callback(data),
            move |err| {
                stats.record_stream_error();
                log::error!("output stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        log::info!("Opened output device {}", device_label(&device));
        Ok(stream)
    }
}

impl AudioBackend for CpalBackend {
    fn open_input(&mut self, callback: InputCallback) -> Result<StreamHandle, LooperError> {
        self.build_input(callback)
            .map(StreamHandle::new)
            .map_err(|err| LooperError::DeviceUnavailable(format!("{err:#}")))
    }

    fn open_output(&mut self, callback: OutputCallback) -> Result<StreamHandle, LooperError> {
        self.build_output(callback)
            .map(StreamHandle::new)
            .map_err(|err| LooperError::DeviceUnavailable(format!("{err:#}")))
    }
}

fn stream_config() -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: CHANNELS,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    }
}

fn supports_looper_format(mut configs: impl Iterator<Item = SupportedStreamConfigRange>) -> bool {
    configs.any(|range| {
        range.channels() == CHANNELS
            && range.sample_format() == SampleFormat::F32
            && range.min_sample_rate().0 <= SAMPLE_RATE
            && range.max_sample_rate().0 >= SAMPLE_RATE
    })
}

fn find_by_name(
    mut devices: impl Iterator<Item = cpal::Device>,
    name: &str,
) -> anyhow::Result<cpal::Device> {
    devices
        .find(|device| device.name().is_ok_and(|n| n == name))
        .ok_or_else(|| anyhow::anyhow!("device '{name}' not found"))
}

fn device_label(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "<unnamed>".to_string())
}
