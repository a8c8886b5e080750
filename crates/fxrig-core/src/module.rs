//! The module contract.
//!
//! Every effect of the chain implements [`Processable`]. The host calls
//! [`Processable::reset`] from a non-real-time context whenever the sample
//! rate or the maximum block size changes, then, for each block on the audio
//! thread: applies the queued parameter events, calls
//! [`Processable::update_params`] and finally [`Processable::process_block`].
//!
//! A module owns its [`ParamStateSet`]. The default `update_params` only
//! advances the ramps; modules override it to read their dirty flags and
//! refresh derived state before rendering.
//!
//! # Example
//!
//! ```rust
//! use fxrig_core::{ModuleError, ModuleState, ParamStateSet, ProcInfo, Processable};
//!
//! struct Invert {
//!     params: ParamStateSet,
//!     state: ModuleState,
//! }
//!
//! impl Processable for Invert {
//!     fn reset(&mut self, sample_rate: f64, _max_block_size: usize) -> Result<usize, ModuleError> {
//!         self.params.set_sample_rate(sample_rate);
//!         self.state = ModuleState::Active;
//!         Ok(0)
//!     }
//!
//!     fn process_block(&mut self, info: &mut ProcInfo<'_>) -> usize {
//!         let nbr_chn = info.inputs.nbr_chn().min(info.outputs.nbr_chn());
//!         for chn in 0..nbr_chn {
//!             let src = info.inputs.channel(chn);
//!             for (dst, &x) in info.outputs.channel_mut(chn).iter_mut().zip(src) {
//!                 *dst = -x;
//!             }
//!         }
//!         nbr_chn
//!     }
//!
//!     fn state(&self) -> ModuleState {
//!         self.state
//!     }
//!
//!     fn clean_quick(&mut self) {}
//!
//!     fn param_set(&self) -> &ParamStateSet {
//!         &self.params
//!     }
//!
//!     fn param_set_mut(&mut self) -> &mut ParamStateSet {
//!         &mut self.params
//!     }
//! }
//! ```

use crate::param_state_set::ParamStateSet;
use crate::proc_info::ProcInfo;

/// Lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModuleState {
    /// Constructed, not yet reset. Not processed.
    #[default]
    Created,
    /// Reset succeeded; processed every block.
    Active,
}

/// Errors a module can report from [`Processable::reset`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModuleError {
    /// The module cannot run at this sample rate.
    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(f64),

    /// The module cannot run with this block size.
    #[error("unsupported block size: {0}")]
    UnsupportedBlockSize(usize),

    /// Internal buffers could not be allocated.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// Any other reason.
    #[error("{0}")]
    Other(String),
}

/// Contract between the host and one effect module.
///
/// Except for [`reset`](Self::reset), methods are called on the audio thread
/// and must not allocate, block or lock.
pub trait Processable: Send {
    /// Prepares the module for `sample_rate` and blocks of at most
    /// `max_block_size` samples, clearing its internal state.
    ///
    /// Returns the latency introduced by the module, in samples. On success
    /// the module becomes [`ModuleState::Active`].
    fn reset(&mut self, sample_rate: f64, max_block_size: usize) -> Result<usize, ModuleError>;

    /// Renders one block. Returns the number of output channels produced,
    /// written from channel 0 upwards.
    fn process_block(&mut self, info: &mut ProcInfo<'_>) -> usize;

    /// Current lifecycle state.
    fn state(&self) -> ModuleState;

    /// Clears audio state (delay lines, filter memories) without
    /// reallocating. Real-time safe.
    fn clean_quick(&mut self);

    /// Parameters of the module.
    fn param_set(&self) -> &ParamStateSet;

    /// Parameters of the module, mutable.
    fn param_set_mut(&mut self) -> &mut ParamStateSet;

    /// Refreshes parameters before [`process_block`](Self::process_block).
    ///
    /// The default advances every ramp by `nbr_spl` samples.
    fn update_params(&mut self, nbr_spl: usize) {
        self.param_set_mut().process_block(nbr_spl);
    }
}
