//! fxrig Core - parameter automation and the module contract
//!
//! This crate holds the real-time building blocks shared by every effect
//! module of the engine. Nothing in the per-block path allocates, blocks or
//! takes a lock.
//!
//! # Core Abstractions
//!
//! ## Module Contract
//!
//! - [`Processable`] - Object-safe trait implemented by every effect module
//! - [`ProcInfo`] - Per-block unit of work (buffers, block length, events)
//! - [`BufferSet`] / [`BufferSetMut`] - Planar channel views
//!
//! ## Parameter Automation
//!
//! - [`ParamDesc`] - Declaration of one parameter (range, curve, default, ramp)
//! - [`ParamState`] - Block-based linear ramp with exact landing on the target
//! - [`ParamStateSet`] - All parameters of a module, with dirty flags
//!
//! ## Curves
//!
//! Conversions between the normalized domain and natural units:
//! [`LinearCurve`], [`LogCurve`], [`PiecewiseLogCurve`], [`PowerCurve`],
//! [`EnumCurve`] and [`FnCurve`].
//!
//! ## Dirty Flags
//!
//! - [`NotificationFlagsBuilder`] / [`NotificationFlags`] - Chained flags
//!   frozen into a flattened observer list
//!
//! ## Events
//!
//! - [`EventQueue`] - Bounded lock-free queue carrying [`ParamEvent`]s from
//!   the control thread to the audio thread
//!
//! # Features
//!
//! - `tracing`: emits `tracing` debug events from non-real-time setup code
//!   (flag graph construction).
//!
//! # Example
//!
//! ```rust
//! use fxrig_core::{EventQueue, ParamDesc, ParamEvent, ParamStateSetBuilder, ParamUnit};
//!
//! let mut builder = ParamStateSetBuilder::new();
//! let level = builder.add(
//!     ParamDesc::linear("Level", -60.0, 0.0, ParamUnit::Decibels).with_default_nat(0.0),
//! );
//! let mut params = builder.build();
//! params.set_sample_rate(48000.0);
//!
//! let (tx, rx) = EventQueue::bounded(64);
//! tx.post(ParamEvent::new(0, level, 0.5)).unwrap();
//!
//! // Audio thread, start of block
//! let mut events = Vec::with_capacity(64);
//! rx.drain_into(&mut events);
//! for ev in &events {
//!     params.set_target(ev.key, ev.value).unwrap();
//! }
//! params.process_block(256);
//! assert!(params.get_val_end_nat(level) < 0.0);
//! ```

pub mod curve;
pub mod event;
pub mod module;
pub mod notification;
pub mod param_desc;
pub mod param_state;
pub mod param_state_set;
pub mod proc_info;

pub use curve::{
    Curve, CurveError, EnumCurve, FnCurve, LinearCurve, LogCurve, PiecewiseLogCurve, PowerCurve,
};
pub use event::{EventError, EventQueue, EventReceiver, EventSender, ParamEvent};
pub use module::{ModuleError, ModuleState, Processable};
pub use notification::{FlagError, FlagId, NotificationFlags, NotificationFlagsBuilder};
pub use param_desc::{
    DEFAULT_RAMP_TIME, ParamCateg, ParamDesc, ParamDomain, ParamKey, ParamUnit,
};
pub use param_state::ParamState;
pub use param_state_set::{ParamError, ParamStateSet, ParamStateSetBuilder};
pub use proc_info::{BufferSet, BufferSetMut, ProcInfo};
