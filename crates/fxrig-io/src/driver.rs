//! Backend seam.
//!
//! An [`AudioDriver`] wraps one platform audio API. The transport drives it
//! through the lifecycle and hands it a [`DeviceHandler`] when buffers are
//! created; from then on the driver calls the handler from its audio thread
//! until [`AudioDriver::dispose_buffers`] drops it.
//!
//! ## Buffer Layout
//!
//! Blocks are interleaved 32-bit words of the selected channels only:
//! `[in0, in1, in0, in1, ...]` for two inputs starting at the channel base.
//! The number of frames is `output.len() / output_channels`.

use crate::Result;

/// Buffer sizes the device accepts, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSizeInfo {
    /// Smallest size.
    pub min: usize,
    /// Largest size.
    pub max: usize,
    /// Size the device works best with.
    pub preferred: usize,
    /// Step between accepted sizes, counted from `min`. 0 accepts any size in
    /// range.
    pub granularity: usize,
}

impl BufferSizeInfo {
    /// Fixed-size device.
    pub const fn fixed(size: usize) -> Self {
        Self {
            min: size,
            max: size,
            preferred: size,
            granularity: 0,
        }
    }

    /// Returns true if the device accepts `size`.
    pub fn accepts(&self, size: usize) -> bool {
        (self.min..=self.max).contains(&size)
            && (self.granularity == 0 || (size - self.min) % self.granularity == 0)
    }

    /// `requested` if accepted, the preferred size otherwise.
    pub fn choose(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|&s| self.accepts(s))
            .unwrap_or(self.preferred)
    }
}

/// Channels offered by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelCount {
    /// Capture channels.
    pub inputs: usize,
    /// Playback channels.
    pub outputs: usize,
}

/// Channel selection and block size for [`AudioDriver::create_buffers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// First device input channel used.
    pub input_channel_base: usize,
    /// Number of input channels used.
    pub input_channels: usize,
    /// First device output channel used.
    pub output_channel_base: usize,
    /// Number of output channels used.
    pub output_channels: usize,
    /// Frames per device callback.
    pub block_size: usize,
}

/// Notifications a device sends outside of the audio stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceEvent {
    /// The device now runs at this rate.
    SampleRateChanged(f64),
    /// The device changed its block size.
    BufferSizeChanged(usize),
    /// The device lost sync and asks to be restarted.
    ResyncRequest,
    /// The device asks for a full reset.
    ResetRequest,
    /// The host did not return in time; a block was lost.
    Overload,
}

/// What the driver calls from its audio thread.
///
/// Both methods run in real-time context: no allocation, no blocking, no
/// lock.
pub trait DeviceHandler: Send {
    /// Consumes one interleaved input block and fills the output block.
    /// `input` may be empty when the device has no capture stream.
    fn process(&mut self, input: &[i32], output: &mut [i32]);

    /// Reacts to a device notification.
    fn event(&mut self, event: DeviceEvent);
}

/// Platform audio API wrapper.
///
/// Methods are called in lifecycle order by the transport, one step at a
/// time, and undone in reverse order: `load`/`unload`, `open`/`close`,
/// `create_buffers`/`dispose_buffers`, `start`/`stop`. An undo method is
/// only called after its forward step succeeded. A failing
/// `create_buffers` drops the handler it was given.
pub trait AudioDriver {
    /// Human-readable backend name (e.g. "cpal", "mock").
    fn name(&self) -> &str;

    /// Names of the devices this backend can load.
    fn driver_names(&mut self) -> Result<Vec<String>>;

    /// Loads the device called `name`.
    fn load(&mut self, name: &str) -> Result<()>;

    /// Releases the loaded device.
    fn unload(&mut self);

    /// Opens a session on the loaded device.
    fn open(&mut self) -> Result<()>;

    /// Closes the session.
    fn close(&mut self);

    /// Returns true if the device can run at `rate`.
    fn can_sample_rate(&self, rate: f64) -> bool;

    /// Switches the device to `rate`.
    fn set_sample_rate(&mut self, rate: f64) -> Result<()>;

    /// Accepted buffer sizes.
    fn buffer_size(&self) -> Result<BufferSizeInfo>;

    /// Channels offered by the device.
    fn channel_count(&self) -> Result<ChannelCount>;

    /// Allocates the device buffers and takes ownership of the handler.
    fn create_buffers(&mut self, config: &BufferConfig, handler: Box<dyn DeviceHandler>) -> Result<()>;

    /// Frees the device buffers and drops the handler.
    fn dispose_buffers(&mut self);

    /// Starts calling the handler.
    fn start(&mut self) -> Result<()>;

    /// Stops calling the handler. Returns once no callback is in flight.
    fn stop(&mut self);
}
