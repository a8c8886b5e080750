//! Audio transport state machine.
//!
//! [`DriverTransport`] owns an [`AudioDriver`] and walks it through
//!
//! ```text
//! Unloaded ─load─▶ Loaded ─open─▶ Initialised ─buffers─▶ Prepared ─start─▶ Running
//!     ◀─unload──        ◀─close──             ◀─dispose──         ◀─stop──
//! ```
//!
//! one step at a time. [`Transport::init`] goes up to `Prepared`,
//! [`Transport::start`] to `Running`, and [`Transport::stop`] all the way
//! down from wherever the transport is, including after a failed `init`.
//!
//! The device callback is served by a private context owning the host
//! ([`TransportCallback`]) and planar float buffers allocated while
//! preparing. Blocks larger than the negotiated size are split.
//!
//! Only one transport may be alive per process. A second
//! [`DriverTransport::new`] fails with [`Error::AlreadyActive`] until the
//! first one is dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use fxrig_core::{BufferSet, BufferSetMut};

use crate::driver::{AudioDriver, BufferConfig, DeviceEvent, DeviceHandler};
use crate::sample_format::{DEFAULT_RESOLUTION_BITS, RESOLUTION_RANGE, read_channel, write_channel};
use crate::{Error, Result};

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TransportState {
    /// No device loaded.
    #[default]
    Unloaded,
    /// Device loaded.
    Loaded,
    /// Session open.
    Initialised,
    /// Format negotiated and buffers allocated.
    Prepared,
    /// Callbacks running.
    Running,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Unloaded => "unloaded",
            TransportState::Loaded => "loaded",
            TransportState::Initialised => "initialised",
            TransportState::Prepared => "prepared",
            TransportState::Running => "running",
        };
        f.write_str(name)
    }
}

/// What the transport calls back into, on the audio thread except for
/// [`prepare`](Self::prepare).
pub trait TransportCallback: Send {
    /// Renders one block of `nbr_spl` samples from `inputs` into `outputs`.
    fn process_block(&mut self, outputs: &mut BufferSetMut<'_>, inputs: &BufferSet<'_>, nbr_spl: usize);

    /// The device needs to be torn down and initialised again. The host
    /// should signal its control thread and return immediately.
    fn request_exit(&mut self);

    /// A block was lost.
    fn notify_dropout(&mut self);

    /// Called once while preparing, before the first block, from the
    /// initialising thread.
    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize) {}
}

/// Abstract transport.
pub trait Transport {
    /// Loads, opens and prepares the device. Returns the negotiated sample
    /// rate and maximum block size.
    ///
    /// On failure the transport stays at the last step it completed;
    /// [`stop`](Self::stop) releases it.
    fn init(
        &mut self,
        driver_name: Option<&str>,
        input_channel_base: usize,
        output_channel_base: usize,
        host: Box<dyn TransportCallback>,
    ) -> Result<(f64, usize)>;

    /// Starts the callbacks. Only valid when prepared.
    fn start(&mut self) -> Result<()>;

    /// Tears everything down, whatever the current state. Idempotent.
    fn stop(&mut self);

    /// Current state.
    fn state(&self) -> TransportState;

    /// Message of the last failed operation.
    fn last_error(&self) -> Option<&str>;
}

/// Requested audio format.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Sample rate in Hz. The device must accept it.
    pub sample_rate: f64,
    /// Block size in frames. Falls back to the device preference when
    /// `None` or not accepted.
    pub buffer_size: Option<usize>,
    /// Input channels used, from the input channel base.
    pub input_channels: usize,
    /// Output channels used, from the output channel base.
    pub output_channels: usize,
    /// Effective bits of the device words.
    pub resolution_bits: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            buffer_size: None,
            input_channels: 2,
            output_channels: 2,
            resolution_bits: DEFAULT_RESOLUTION_BITS,
        }
    }
}

impl TransportConfig {
    fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if !RESOLUTION_RANGE.contains(&self.resolution_bits) {
            return Err(Error::InvalidConfig(format!(
                "resolution must be within {:?} bits, got {}",
                RESOLUTION_RANGE, self.resolution_bits
            )));
        }
        if self.output_channels == 0 {
            return Err(Error::InvalidConfig("at least one output channel is required".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Instance registry
// ============================================================================

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Proof of owning the process-wide transport slot. Released on drop.
#[derive(Debug)]
struct RegistrySlot(());

impl RegistrySlot {
    fn acquire() -> Result<Self> {
        ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RegistrySlot(()))
            .map_err(|_| Error::AlreadyActive)
    }
}

impl Drop for RegistrySlot {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::Release);
    }
}

// ============================================================================
// Callback context
// ============================================================================

/// Rounds a block size up to a multiple of 4 samples.
#[inline]
pub(crate) const fn aligned_len(nbr_spl: usize) -> usize {
    (nbr_spl + 3) & !3
}

fn alloc_buffer(len: usize) -> Result<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::BufferAllocationFailed(len))?;
    buf.resize(len, 0.0);
    Ok(buf)
}

/// Serves the device callback: converts, splits and forwards to the host.
struct CallbackContext {
    host: Box<dyn TransportCallback>,
    inputs: Vec<f32>,
    outputs: Vec<f32>,
    nbr_in: usize,
    nbr_out: usize,
    stride: usize,
    max_block: usize,
    resolution_bits: u32,
    sample_rate: f64,
}

impl CallbackContext {
    fn new(
        host: Box<dyn TransportCallback>,
        config: &BufferConfig,
        sample_rate: f64,
        resolution_bits: u32,
    ) -> Result<Self> {
        let stride = aligned_len(config.block_size);
        Ok(Self {
            host,
            inputs: alloc_buffer(config.input_channels * stride)?,
            outputs: alloc_buffer(config.output_channels * stride)?,
            nbr_in: config.input_channels,
            nbr_out: config.output_channels,
            stride,
            max_block: config.block_size,
            resolution_bits,
            sample_rate,
        })
    }
}

impl DeviceHandler for CallbackContext {
    fn process(&mut self, input: &[i32], output: &mut [i32]) {
        let frames = output.len() / self.nbr_out.max(1);
        let stride = self.stride;
        let mut pos = 0;
        while pos < frames {
            let n = (frames - pos).min(self.max_block);

            for chn in 0..self.nbr_in {
                let dst = &mut self.inputs[chn * stride..chn * stride + n];
                read_channel(input, self.nbr_in, chn, pos, dst);
            }

            let ins = BufferSet::new(&self.inputs, stride, n);
            let mut outs = BufferSetMut::new(&mut self.outputs, stride, n);
            self.host.process_block(&mut outs, &ins, n);

            for chn in 0..self.nbr_out {
                let src = &self.outputs[chn * stride..chn * stride + n];
                write_channel(src, self.resolution_bits, output, self.nbr_out, chn, pos);
            }
            pos += n;
        }
    }

    fn event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::SampleRateChanged(rate) => {
                if rate != self.sample_rate {
                    self.host.request_exit();
                }
            }
            DeviceEvent::BufferSizeChanged(_)
            | DeviceEvent::ResyncRequest
            | DeviceEvent::ResetRequest => self.host.request_exit(),
            DeviceEvent::Overload => self.host.notify_dropout(),
        }
    }
}

// ============================================================================
// Driver transport
// ============================================================================

/// [`Transport`] over an [`AudioDriver`].
///
/// Dropping the transport stops it and frees the process slot.
pub struct DriverTransport<D: AudioDriver> {
    driver: D,
    config: TransportConfig,
    state: TransportState,
    sample_rate: f64,
    block_size: usize,
    last_error: Option<String>,
    _slot: RegistrySlot,
}

impl<D: AudioDriver> DriverTransport<D> {
    /// Creates an unloaded transport.
    ///
    /// Fails with [`Error::AlreadyActive`] if another transport is alive,
    /// or [`Error::InvalidConfig`] if `config` cannot work on any device.
    pub fn new(driver: D, config: TransportConfig) -> Result<Self> {
        config.validate()?;
        let slot = RegistrySlot::acquire()?;
        Ok(Self {
            driver,
            config,
            state: TransportState::Unloaded,
            sample_rate: 0.0,
            block_size: 0,
            last_error: None,
            _slot: slot,
        })
    }

    /// Requested format.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Negotiated sample rate, 0 before preparing.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Negotiated block size, 0 before preparing.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn expect_state(&self, expected: TransportState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected,
                found: self.state,
            })
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                tracing::warn!(state = %self.state, error = %e, "transport operation failed");
                self.last_error = Some(e.to_string());
            }
        }
        result
    }

    fn select_device(&mut self, driver_name: Option<&str>) -> Result<String> {
        let names = self.driver.driver_names()?;
        match driver_name {
            Some(wanted) => {
                if let Some(exact) = names.iter().find(|n| n.as_str() == wanted) {
                    return Ok(exact.clone());
                }
                let lower = wanted.to_lowercase();
                names
                    .into_iter()
                    .find(|n| n.to_lowercase().contains(&lower))
                    .ok_or_else(|| Error::DeviceNotFound(wanted.to_string()))
            }
            None => names
                .into_iter()
                .next()
                .ok_or_else(|| Error::DeviceNotFound("no audio device available".into())),
        }
    }

    fn load(&mut self, driver_name: Option<&str>) -> Result<()> {
        let name = self.select_device(driver_name)?;
        self.driver.load(&name)?;
        self.state = TransportState::Loaded;
        tracing::info!(backend = self.driver.name(), device = %name, "device loaded");
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        self.driver.open()?;
        self.state = TransportState::Initialised;
        tracing::info!("device session opened");
        Ok(())
    }

    fn prepare(
        &mut self,
        input_channel_base: usize,
        output_channel_base: usize,
        mut host: Box<dyn TransportCallback>,
    ) -> Result<(f64, usize)> {
        let rate = self.config.sample_rate;
        if !self.driver.can_sample_rate(rate) {
            return Err(Error::UnsupportedSampleRate(rate));
        }
        self.driver.set_sample_rate(rate)?;

        let block_size = self.driver.buffer_size()?.choose(self.config.buffer_size);
        if block_size == 0 {
            return Err(Error::InvalidConfig("device reports a zero block size".into()));
        }

        let available = self.driver.channel_count()?;
        let check = |direction, base: usize, count: usize, available: usize| {
            let required = base + count;
            if required > available {
                Err(Error::InsufficientChannels {
                    direction,
                    required,
                    available,
                })
            } else {
                Ok(())
            }
        };
        check("input", input_channel_base, self.config.input_channels, available.inputs)?;
        check("output", output_channel_base, self.config.output_channels, available.outputs)?;

        let buffers = BufferConfig {
            input_channel_base,
            input_channels: self.config.input_channels,
            output_channel_base,
            output_channels: self.config.output_channels,
            block_size,
        };
        host.prepare(rate, block_size);
        let context = CallbackContext::new(host, &buffers, rate, self.config.resolution_bits)?;
        self.driver.create_buffers(&buffers, Box::new(context))?;

        self.sample_rate = rate;
        self.block_size = block_size;
        self.state = TransportState::Prepared;
        tracing::info!(
            sample_rate = rate,
            block_size,
            inputs = buffers.input_channels,
            outputs = buffers.output_channels,
            resolution_bits = self.config.resolution_bits,
            "audio format negotiated"
        );
        Ok((rate, block_size))
    }

    fn init_steps(
        &mut self,
        driver_name: Option<&str>,
        input_channel_base: usize,
        output_channel_base: usize,
        host: Box<dyn TransportCallback>,
    ) -> Result<(f64, usize)> {
        self.expect_state(TransportState::Unloaded)?;
        self.load(driver_name)?;
        self.open()?;
        self.prepare(input_channel_base, output_channel_base, host)
    }

    /// Undoes the last completed step.
    fn step_down(&mut self) {
        self.state = match self.state {
            TransportState::Running => {
                self.driver.stop();
                tracing::debug!("device stopped");
                TransportState::Prepared
            }
            TransportState::Prepared => {
                self.driver.dispose_buffers();
                self.sample_rate = 0.0;
                self.block_size = 0;
                tracing::debug!("device buffers disposed");
                TransportState::Initialised
            }
            TransportState::Initialised => {
                self.driver.close();
                tracing::debug!("device session closed");
                TransportState::Loaded
            }
            TransportState::Loaded => {
                self.driver.unload();
                tracing::debug!("device unloaded");
                TransportState::Unloaded
            }
            TransportState::Unloaded => TransportState::Unloaded,
        };
    }
}

impl<D: AudioDriver> Transport for DriverTransport<D> {
    fn init(
        &mut self,
        driver_name: Option<&str>,
        input_channel_base: usize,
        output_channel_base: usize,
        host: Box<dyn TransportCallback>,
    ) -> Result<(f64, usize)> {
        let result = self.init_steps(driver_name, input_channel_base, output_channel_base, host);
        self.record(result)
    }

    fn start(&mut self) -> Result<()> {
        let result = self.expect_state(TransportState::Prepared).and_then(|()| {
            self.driver
                .start()
                .map_err(|e| Error::StartFailed(e.to_string()))
        });
        if result.is_ok() {
            self.state = TransportState::Running;
            tracing::info!("audio transport running");
        }
        self.record(result)
    }

    fn stop(&mut self) {
        if self.state == TransportState::Unloaded {
            return;
        }
        while self.state != TransportState::Unloaded {
            self.step_down();
        }
        tracing::info!("audio transport stopped");
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl<D: AudioDriver> Drop for DriverTransport<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<D: AudioDriver> fmt::Debug for DriverTransport<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverTransport")
            .field("backend", &self.driver.name())
            .field("state", &self.state)
            .field("sample_rate", &self.sample_rate)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;

    use super::*;

    static SERIAL: Mutex<()> = Mutex::new(());

    #[derive(Default)]
    struct Counters {
        exits: AtomicUsize,
        dropouts: AtomicUsize,
        blocks: Mutex<Vec<usize>>,
    }

    struct Recorder(Arc<Counters>);

    impl TransportCallback for Recorder {
        fn process_block(&mut self, outputs: &mut BufferSetMut<'_>, inputs: &BufferSet<'_>, nbr_spl: usize) {
            for chn in 0..outputs.nbr_chn() {
                let src = inputs.channel(chn.min(inputs.nbr_chn() - 1));
                outputs.channel_mut(chn).copy_from_slice(src);
            }
            // Test-only: the recorder may allocate.
            self.0.blocks.lock().push(nbr_spl);
        }

        fn request_exit(&mut self) {
            self.0.exits.fetch_add(1, Ordering::Relaxed);
        }

        fn notify_dropout(&mut self) {
            self.0.dropouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn context(block_size: usize) -> (CallbackContext, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let config = BufferConfig {
            input_channel_base: 0,
            input_channels: 2,
            output_channel_base: 0,
            output_channels: 2,
            block_size,
        };
        let ctx = CallbackContext::new(Box::new(Recorder(Arc::clone(&counters))), &config, 48000.0, 24)
            .unwrap();
        (ctx, counters)
    }

    #[test]
    fn alignment_rounds_up_to_four() {
        assert_eq!(aligned_len(0), 0);
        assert_eq!(aligned_len(1), 4);
        assert_eq!(aligned_len(4), 4);
        assert_eq!(aligned_len(255), 256);
        assert_eq!(aligned_len(257), 260);
    }

    #[test]
    fn large_device_blocks_are_split() {
        let (mut ctx, counters) = context(64);
        let input: Vec<i32> = (0..150 * 2).map(|i| (i as i32) << 8).collect();
        let mut output = vec![0i32; 150 * 2];
        ctx.process(&input, &mut output);
        assert_eq!(*counters.blocks.lock(), vec![64, 64, 22]);
        assert_eq!(input, output);
    }

    #[test]
    fn missing_input_reads_as_silence() {
        let (mut ctx, _) = context(32);
        let mut output = vec![7i32; 32 * 2];
        ctx.process(&[], &mut output);
        assert!(output.iter().all(|&w| w == 0));
    }

    #[test]
    fn device_events_map_to_host_calls() {
        let (mut ctx, counters) = context(32);
        ctx.event(DeviceEvent::SampleRateChanged(48000.0));
        assert_eq!(counters.exits.load(Ordering::Relaxed), 0);
        ctx.event(DeviceEvent::SampleRateChanged(44100.0));
        ctx.event(DeviceEvent::BufferSizeChanged(128));
        ctx.event(DeviceEvent::ResyncRequest);
        ctx.event(DeviceEvent::ResetRequest);
        assert_eq!(counters.exits.load(Ordering::Relaxed), 4);
        ctx.event(DeviceEvent::Overload);
        assert_eq!(counters.dropouts.load(Ordering::Relaxed), 1);
        assert_eq!(counters.exits.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn registry_allows_one_transport() {
        let _guard = SERIAL.lock();
        let (driver, _) = crate::MockDriver::new();
        let first = DriverTransport::new(driver, TransportConfig::default()).unwrap();
        let (driver, _) = crate::MockDriver::new();
        assert_eq!(
            DriverTransport::new(driver, TransportConfig::default()).err(),
            Some(Error::AlreadyActive)
        );
        drop(first);
        let (driver, _) = crate::MockDriver::new();
        assert!(DriverTransport::new(driver, TransportConfig::default()).is_ok());
    }

    #[test]
    fn invalid_config_does_not_take_the_slot() {
        let _guard = SERIAL.lock();
        let (driver, _) = crate::MockDriver::new();
        let config = TransportConfig {
            resolution_bits: 4,
            ..TransportConfig::default()
        };
        assert!(matches!(
            DriverTransport::new(driver, config),
            Err(Error::InvalidConfig(_))
        ));
        let (driver, _) = crate::MockDriver::new();
        assert!(DriverTransport::new(driver, TransportConfig::default()).is_ok());
    }
}
