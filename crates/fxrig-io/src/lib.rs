//! Audio transport and block dispatch for fxrig.
//!
//! This crate provides:
//!
//! - **Driver seam**: the [`AudioDriver`] trait a hardware backend implements,
//!   and the [`DeviceHandler`] it calls from its audio thread
//! - **Transport state machine**: [`DriverTransport`] walks a driver through
//!   `Unloaded → Loaded → Initialised → Prepared → Running` and back,
//!   converting between device words and float buffers in the callback
//! - **Dispatch**: [`Dispatcher`] runs a chain of
//!   [`Processable`](fxrig_core::Processable) modules each block, delivering
//!   queued parameter events first
//! - **Backends**: [`CpalDriver`] for desktop audio, [`MockDriver`] for
//!   deterministic tests with failure injection
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use fxrig_core::EventQueue;
//! use fxrig_io::{Dispatcher, DriverTransport, HostStatus, MockDriver, Transport, TransportConfig};
//!
//! let (_tx, rx) = EventQueue::bounded(64);
//! let status = Arc::new(HostStatus::new());
//! let host = Dispatcher::new(2, rx, Arc::clone(&status));
//!
//! let (driver, device) = MockDriver::new();
//! let mut transport = DriverTransport::new(driver, TransportConfig::default()).unwrap();
//! let (rate, block) = transport.init(None, 0, 0, Box::new(host)).unwrap();
//! assert_eq!((rate, block), (48000.0, 256));
//!
//! transport.start().unwrap();
//! let out = device.run_block(&vec![0; 256 * 2]).unwrap();
//! assert!(out.iter().all(|&w| w == 0));
//! assert_eq!(status.blocks(), 1);
//!
//! transport.stop();
//! ```

pub mod cpal_driver;
pub mod dispatch;
pub mod driver;
pub mod mock_driver;
pub mod sample_format;
pub mod transport;

pub use cpal_driver::{CpalDriver, DeviceInfo, list_devices};
pub use dispatch::{Dispatcher, HostStatus};
pub use driver::{AudioDriver, BufferConfig, BufferSizeInfo, ChannelCount, DeviceEvent, DeviceHandler};
pub use mock_driver::{FailPoint, MockConfig, MockDriver, MockHandle};
pub use sample_format::{DEFAULT_RESOLUTION_BITS, float_to_native, native_to_float};
pub use transport::{
    DriverTransport, Transport, TransportCallback, TransportConfig, TransportState,
};

/// Error types for the audio transport.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// No device matches the requested name, or no device at all.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The device refuses the configured sample rate.
    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(f64),

    /// The device has fewer channels than the configured base + count.
    #[error("insufficient {direction} channels: need {required}, device has {available}")]
    InsufficientChannels {
        /// `"input"` or `"output"`.
        direction: &'static str,
        /// Channel base plus channel count.
        required: usize,
        /// Channels offered by the device.
        available: usize,
    },

    /// Callback buffers could not be allocated.
    #[error("buffer allocation failed ({0} samples)")]
    BufferAllocationFailed(usize),

    /// The device refused to start.
    #[error("device failed to start: {0}")]
    StartFailed(String),

    /// The operation is not allowed in the current transport state.
    #[error("invalid transport state: expected {expected}, found {found}")]
    InvalidState {
        /// State the operation requires.
        expected: TransportState,
        /// Current state.
        found: TransportState,
    },

    /// Another transport is already alive in this process.
    #[error("an audio transport is already active")]
    AlreadyActive,

    /// The transport configuration is not usable.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// Backend-specific failure.
    #[error("driver error: {0}")]
    Driver(String),

    /// Stream setup or runtime error reported by the backend.
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Convenience result type for transport operations.
pub type Result<T> = std::result::Result<T, Error>;
