//! cpal-based driver.
//!
//! [`CpalDriver`] exposes the output devices of the platform's default
//! [cpal](https://crates.io/crates/cpal) host (ALSA, CoreAudio, WASAPI) as an
//! [`AudioDriver`]. Loading a device also picks the input device with the
//! same name, or the default input device.
//!
//! cpal runs capture and playback as two streams. The output callback owns
//! the [`DeviceHandler`]; captured words reach it through a bounded channel
//! and stream errors through a second one, so neither callback locks or
//! allocates. Captured audio crosses the channel in whole frames only: a
//! frame that does not fit is dropped, and a frame not fully queued yet is
//! played as silence, so the channel order never shifts.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, Stream};
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::driver::{
    AudioDriver, BufferConfig, BufferSizeInfo, ChannelCount, DeviceEvent, DeviceHandler,
};
use crate::sample_format::{float_to_native, native_to_float};
use crate::{Error, Result};

/// Preferred block size when the device leaves the choice open.
const DEFAULT_BLOCK: usize = 256;

/// Extract device name via `description()` (cpal 0.17+).
fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports audio input.
    pub is_input: bool,
    /// Whether the device supports audio output.
    pub is_output: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// List all available audio devices of the default host.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let mut devices: Vec<DeviceInfo> = Vec::new();

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device_name(&device) {
                let sample_rate = device
                    .default_input_config()
                    .map(|c| c.sample_rate())
                    .unwrap_or(48000);
                devices.push(DeviceInfo {
                    name,
                    is_input: true,
                    is_output: device.default_output_config().is_ok(),
                    default_sample_rate: sample_rate,
                });
            }
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device_name(&device) {
                if devices.iter().any(|d| d.name == name) {
                    continue;
                }
                let sample_rate = device
                    .default_output_config()
                    .map(|c| c.sample_rate())
                    .unwrap_or(48000);
                devices.push(DeviceInfo {
                    name,
                    is_input: false,
                    is_output: true,
                    default_sample_rate: sample_rate,
                });
            }
        }
    }

    Ok(devices)
}

/// Queues one captured frame, or nothing if the whole frame does not fit.
///
/// The capture callback is the only sender, so free space cannot shrink
/// between the check and the sends.
fn push_frame(tx: &Sender<i32>, frame: &[i32]) -> bool {
    let free = tx
        .capacity()
        .map_or(usize::MAX, |cap| cap.saturating_sub(tx.len()));
    if free < frame.len() {
        return false;
    }
    frame.iter().all(|&w| tx.try_send(w).is_ok())
}

/// Takes one whole frame. Leaves the queue untouched and fills `frame` with
/// silence if less than a frame is queued.
///
/// The output callback is the only receiver, so queued words cannot
/// disappear between the check and the reads.
fn pull_frame(rx: &Receiver<i32>, frame: &mut [i32]) -> bool {
    if rx.len() < frame.len() {
        frame.fill(0);
        return false;
    }
    for w in frame.iter_mut() {
        *w = rx.try_recv().unwrap_or(0);
    }
    true
}

fn stream_err(e: impl std::fmt::Display) -> Error {
    Error::Stream(e.to_string())
}

struct Streams {
    input: Option<Stream>,
    output: Stream,
}

/// [`AudioDriver`] over the default cpal host.
pub struct CpalDriver {
    host: Host,
    output: Option<Device>,
    input: Option<Device>,
    open: bool,
    sample_rate: u32,
    streams: Option<Streams>,
}

impl CpalDriver {
    /// Driver on the platform's default audio host.
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal driver initialized");
        Self {
            host,
            output: None,
            input: None,
            open: false,
            sample_rate: 0,
            streams: None,
        }
    }

    fn output_device(&self) -> Result<&Device> {
        self.output
            .as_ref()
            .ok_or_else(|| Error::Driver("no device loaded".into()))
    }

    fn build_streams(&self, config: &BufferConfig, mut handler: Box<dyn DeviceHandler>) -> Result<Streams> {
        let block = config.block_size;
        let nbr_in = config.input_channels;
        let nbr_out = config.output_channels;
        let in_base = config.input_channel_base;
        let out_base = config.output_channel_base;
        let dev_out = out_base + nbr_out;
        let dev_in = in_base + nbr_in;

        let (event_tx, event_rx): (Sender<DeviceEvent>, Receiver<DeviceEvent>) = bounded(16);

        let mut input_stream = None;
        let mut captured: Option<Receiver<i32>> = None;
        if nbr_in > 0
            && let Some(device) = &self.input
        {
            let (tx, rx) = bounded::<i32>(block * nbr_in * 4);
            let stream_config = cpal::StreamConfig {
                channels: dev_in as u16,
                sample_rate: self.sample_rate,
                buffer_size: cpal::BufferSize::Fixed(block as u32),
            };
            let errors = event_tx.clone();
            let mut words = vec![0i32; nbr_in];
            let stream = device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        for frame in data.chunks_exact(dev_in) {
                            for (w, &s) in words.iter_mut().zip(&frame[in_base..]) {
                                *w = float_to_native(s, 32);
                            }
                            push_frame(&tx, &words);
                        }
                    },
                    move |err| {
                        let _ = errors.try_send(map_stream_error(&err));
                    },
                    None,
                )
                .map_err(stream_err)?;
            input_stream = Some(stream);
            captured = Some(rx);
        }

        let mut in_words = vec![0i32; block * nbr_in];
        let mut out_words = vec![0i32; block * nbr_out];
        let stream_config = cpal::StreamConfig {
            channels: dev_out as u16,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(block as u32),
        };
        let output = self
            .output_device()?
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(event) = event_rx.try_recv() {
                        handler.event(event);
                    }
                    let frames = data.len() / dev_out;
                    let mut pos = 0;
                    while pos < frames {
                        let n = (frames - pos).min(block);
                        let ins = &mut in_words[..n * nbr_in];
                        match &captured {
                            Some(rx) => {
                                for frame in ins.chunks_exact_mut(nbr_in) {
                                    pull_frame(rx, frame);
                                }
                            }
                            None => ins.fill(0),
                        }
                        let outs = &mut out_words[..n * nbr_out];
                        handler.process(ins, outs);
                        for f in 0..n {
                            let frame = &mut data[(pos + f) * dev_out..(pos + f + 1) * dev_out];
                            frame[..out_base].fill(0.0);
                            for (d, &w) in frame[out_base..].iter_mut().zip(&outs[f * nbr_out..]) {
                                *d = native_to_float(w);
                            }
                        }
                        pos += n;
                    }
                },
                move |err| {
                    let _ = event_tx.try_send(map_stream_error(&err));
                },
                None,
            )
            .map_err(stream_err)?;

        Ok(Streams {
            input: input_stream,
            output,
        })
    }
}

fn map_stream_error(err: &cpal::StreamError) -> DeviceEvent {
    match err {
        cpal::StreamError::DeviceNotAvailable => DeviceEvent::ResetRequest,
        _ => DeviceEvent::Overload,
    }
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDriver for CpalDriver {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn driver_names(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if let Some(default) = self.host.default_output_device() {
            names.push(device_name(&default).map_err(stream_err)?);
        }
        for device in self.host.output_devices().map_err(stream_err)? {
            if let Ok(name) = device_name(&device)
                && !names.contains(&name)
            {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn load(&mut self, name: &str) -> Result<()> {
        let output = self
            .host
            .output_devices()
            .map_err(stream_err)?
            .find(|d| device_name(d).is_ok_and(|n| n == name))
            .ok_or_else(|| Error::DeviceNotFound(name.to_string()))?;
        let input = self
            .host
            .input_devices()
            .ok()
            .and_then(|mut devices| devices.find(|d| device_name(d).is_ok_and(|n| n == name)))
            .or_else(|| self.host.default_input_device());
        self.output = Some(output);
        self.input = input;
        Ok(())
    }

    fn unload(&mut self) {
        self.output = None;
        self.input = None;
    }

    fn open(&mut self) -> Result<()> {
        self.output_device()?
            .default_output_config()
            .map_err(stream_err)?;
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn can_sample_rate(&self, rate: f64) -> bool {
        let Ok(device) = self.output_device() else {
            return false;
        };
        let Ok(mut ranges) = device.supported_output_configs() else {
            return false;
        };
        ranges.any(|r| {
            f64::from(r.min_sample_rate()) <= rate && rate <= f64::from(r.max_sample_rate())
        })
    }

    fn set_sample_rate(&mut self, rate: f64) -> Result<()> {
        if !self.can_sample_rate(rate) {
            return Err(Error::UnsupportedSampleRate(rate));
        }
        self.sample_rate = rate.round() as u32;
        Ok(())
    }

    fn buffer_size(&self) -> Result<BufferSizeInfo> {
        let config = self
            .output_device()?
            .default_output_config()
            .map_err(stream_err)?;
        Ok(match config.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } => {
                let (min, max) = (*min as usize, *max as usize);
                BufferSizeInfo {
                    min,
                    max,
                    preferred: DEFAULT_BLOCK.clamp(min, max),
                    granularity: 0,
                }
            }
            cpal::SupportedBufferSize::Unknown => BufferSizeInfo {
                min: 16,
                max: 8192,
                preferred: DEFAULT_BLOCK,
                granularity: 0,
            },
        })
    }

    fn channel_count(&self) -> Result<ChannelCount> {
        let outputs = self
            .output_device()?
            .supported_output_configs()
            .map_err(stream_err)?
            .map(|c| usize::from(c.channels()))
            .max()
            .unwrap_or(0);
        let inputs = self
            .input
            .as_ref()
            .and_then(|d| d.supported_input_configs().ok())
            .and_then(|configs| configs.map(|c| usize::from(c.channels())).max())
            .unwrap_or(0);
        Ok(ChannelCount { inputs, outputs })
    }

    fn create_buffers(&mut self, config: &BufferConfig, handler: Box<dyn DeviceHandler>) -> Result<()> {
        if !self.open {
            return Err(Error::Driver("device session not open".into()));
        }
        self.streams = Some(self.build_streams(config, handler)?);
        Ok(())
    }

    fn dispose_buffers(&mut self) {
        self.streams = None;
    }

    fn start(&mut self) -> Result<()> {
        let streams = self
            .streams
            .as_ref()
            .ok_or_else(|| Error::Driver("no stream built".into()))?;
        if let Some(input) = &streams.input {
            input.play().map_err(stream_err)?;
        }
        streams.output.play().map_err(stream_err)?;
        tracing::info!(sample_rate = self.sample_rate, "cpal streams started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(streams) = &self.streams {
            if let Err(e) = streams.output.pause() {
                tracing::warn!(error = %e, "failed to pause output stream");
            }
            if let Some(input) = &streams.input
                && let Err(e) = input.pause()
            {
                tracing::warn!(error = %e, "failed to pause input stream");
            }
        }
    }
}
