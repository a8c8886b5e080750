//! Deterministic in-process driver.
//!
//! [`MockDriver`] implements [`AudioDriver`] without touching hardware. The
//! paired [`MockHandle`] stays with the test: it injects failures, plays the
//! audio thread by running blocks through the registered handler, sends
//! device events, and reports which resources are still held so teardown
//! can be checked.
//!
//! ```rust
//! use fxrig_io::{FailPoint, MockDriver};
//!
//! let (driver, device) = MockDriver::new();
//! device.fail_at(Some(FailPoint::Open));
//! assert_eq!(device.live_resources(), 0);
//! # drop(driver);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::{
    AudioDriver, BufferConfig, BufferSizeInfo, ChannelCount, DeviceEvent, DeviceHandler,
};
use crate::{Error, Result};

/// Driver operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Device enumeration.
    DriverNames,
    /// Device loading.
    Load,
    /// Session opening.
    Open,
    /// Sample rate switch.
    SetSampleRate,
    /// Buffer size query.
    BufferSize,
    /// Channel count query.
    ChannelCount,
    /// Buffer creation.
    CreateBuffers,
    /// Stream start.
    Start,
}

impl FailPoint {
    /// Every fail point, in lifecycle order.
    pub const ALL: [FailPoint; 8] = [
        FailPoint::DriverNames,
        FailPoint::Load,
        FailPoint::Open,
        FailPoint::SetSampleRate,
        FailPoint::BufferSize,
        FailPoint::ChannelCount,
        FailPoint::CreateBuffers,
        FailPoint::Start,
    ];
}

/// What the simulated device offers.
#[derive(Debug, Clone, PartialEq)]
pub struct MockConfig {
    /// Device names, the first one being the default.
    pub devices: Vec<String>,
    /// Accepted sample rates.
    pub sample_rates: Vec<f64>,
    /// Accepted buffer sizes.
    pub buffer_size: BufferSizeInfo,
    /// Available channels.
    pub channels: ChannelCount,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            devices: vec!["Mock Device".to_string()],
            sample_rates: vec![44100.0, 48000.0, 96000.0],
            buffer_size: BufferSizeInfo {
                min: 32,
                max: 2048,
                preferred: 256,
                granularity: 32,
            },
            channels: ChannelCount {
                inputs: 2,
                outputs: 2,
            },
        }
    }
}

#[derive(Default)]
struct Shared {
    config: MockConfig,
    fail: Option<FailPoint>,
    loaded: Option<String>,
    open: bool,
    sample_rate: f64,
    buffers: Option<BufferConfig>,
    handler: Option<Box<dyn DeviceHandler>>,
    running: bool,
    calls: Vec<&'static str>,
}

impl Shared {
    fn check(&mut self, op: &'static str, point: FailPoint) -> Result<()> {
        self.calls.push(op);
        if self.fail == Some(point) {
            Err(Error::Driver(format!("injected failure in {op}")))
        } else {
            Ok(())
        }
    }
}

/// Simulated backend. See the [module documentation](self).
pub struct MockDriver {
    shared: Arc<Mutex<Shared>>,
}

/// Test-side view of a [`MockDriver`].
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MockDriver {
    /// Driver simulating the default device: one stereo device at 48 kHz
    /// with 256-frame blocks preferred.
    pub fn new() -> (Self, MockHandle) {
        Self::with_config(MockConfig::default())
    }

    /// Driver simulating `config`.
    pub fn with_config(config: MockConfig) -> (Self, MockHandle) {
        let shared = Arc::new(Mutex::new(Shared {
            config,
            ..Shared::default()
        }));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockHandle { shared },
        )
    }
}

impl AudioDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn driver_names(&mut self) -> Result<Vec<String>> {
        let mut s = self.shared.lock();
        s.check("driver_names", FailPoint::DriverNames)?;
        Ok(s.config.devices.clone())
    }

    fn load(&mut self, name: &str) -> Result<()> {
        let mut s = self.shared.lock();
        s.check("load", FailPoint::Load)?;
        if !s.config.devices.iter().any(|d| d == name) {
            return Err(Error::DeviceNotFound(name.to_string()));
        }
        s.loaded = Some(name.to_string());
        Ok(())
    }

    fn unload(&mut self) {
        let mut s = self.shared.lock();
        s.calls.push("unload");
        s.loaded = None;
    }

    fn open(&mut self) -> Result<()> {
        let mut s = self.shared.lock();
        s.check("open", FailPoint::Open)?;
        s.open = true;
        Ok(())
    }

    fn close(&mut self) {
        let mut s = self.shared.lock();
        s.calls.push("close");
        s.open = false;
    }

    fn can_sample_rate(&self, rate: f64) -> bool {
        self.shared.lock().config.sample_rates.contains(&rate)
    }

    fn set_sample_rate(&mut self, rate: f64) -> Result<()> {
        let mut s = self.shared.lock();
        s.check("set_sample_rate", FailPoint::SetSampleRate)?;
        s.sample_rate = rate;
        Ok(())
    }

    fn buffer_size(&self) -> Result<BufferSizeInfo> {
        let mut s = self.shared.lock();
        s.check("buffer_size", FailPoint::BufferSize)?;
        Ok(s.config.buffer_size)
    }

    fn channel_count(&self) -> Result<ChannelCount> {
        let mut s = self.shared.lock();
        s.check("channel_count", FailPoint::ChannelCount)?;
        Ok(s.config.channels)
    }

    fn create_buffers(&mut self, config: &BufferConfig, handler: Box<dyn DeviceHandler>) -> Result<()> {
        let mut s = self.shared.lock();
        s.check("create_buffers", FailPoint::CreateBuffers)?;
        s.buffers = Some(*config);
        s.handler = Some(handler);
        Ok(())
    }

    fn dispose_buffers(&mut self) {
        let mut s = self.shared.lock();
        s.calls.push("dispose_buffers");
        s.buffers = None;
        s.handler = None;
    }

    fn start(&mut self) -> Result<()> {
        let mut s = self.shared.lock();
        s.check("start", FailPoint::Start)?;
        s.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut s = self.shared.lock();
        s.calls.push("stop");
        s.running = false;
    }
}

impl MockHandle {
    /// Makes the given operation fail from now on. `None` clears it.
    pub fn fail_at(&self, point: Option<FailPoint>) {
        self.shared.lock().fail = point;
    }

    /// Resources currently held: loaded device, open session, buffers and
    /// running stream count one each.
    pub fn live_resources(&self) -> usize {
        let s = self.shared.lock();
        usize::from(s.loaded.is_some())
            + usize::from(s.open)
            + usize::from(s.buffers.is_some())
            + usize::from(s.running)
    }

    /// Returns true if a handler is registered.
    pub fn has_handler(&self) -> bool {
        self.shared.lock().handler.is_some()
    }

    /// Returns true if the stream is started.
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Name of the loaded device.
    pub fn loaded_device(&self) -> Option<String> {
        self.shared.lock().loaded.clone()
    }

    /// Rate set by the transport.
    pub fn sample_rate(&self) -> f64 {
        self.shared.lock().sample_rate
    }

    /// Buffer configuration passed to `create_buffers`.
    pub fn buffer_config(&self) -> Option<BufferConfig> {
        self.shared.lock().buffers
    }

    /// Driver calls so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.shared.lock().calls.clone()
    }

    /// Runs one block of the negotiated size through the handler, as the
    /// device thread would. `input` holds interleaved words of the selected
    /// input channels. Returns `None` unless the stream is running.
    pub fn run_block(&self, input: &[i32]) -> Option<Vec<i32>> {
        let frames = self.shared.lock().buffers?.block_size;
        self.run_frames(input, frames)
    }

    /// Runs `frames` frames through the handler, which may split them.
    pub fn run_frames(&self, input: &[i32], frames: usize) -> Option<Vec<i32>> {
        let mut s = self.shared.lock();
        if !s.running {
            return None;
        }
        let nbr_out = s.buffers?.output_channels;
        let mut output = vec![0i32; frames * nbr_out];
        s.handler.as_mut()?.process(input, &mut output);
        Some(output)
    }

    /// Delivers a device notification. Returns false if no handler is
    /// registered.
    pub fn send_event(&self, event: DeviceEvent) -> bool {
        match self.shared.lock().handler.as_mut() {
            Some(handler) => {
                handler.event(event);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHandle")
            .field("live_resources", &self.live_resources())
            .finish_non_exhaustive()
    }
}
