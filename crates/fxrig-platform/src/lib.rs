//! fxrig Platform - mapping physical and virtual controls to parameters
//!
//! This crate turns raw control values (pot positions, pedal sweeps, encoder
//! steps, MIDI CC, GUI sliders) into normalized parameter targets posted to
//! the audio thread.
//!
//! # Core Abstractions
//!
//! ## Control Sources
//!
//! - [`ControlSource`] - Typed control identifier (kind + index)
//! - [`SourceKind`] - Absolute or relative source family
//!
//! ## Mapping
//!
//! - [`ControlCurve`] / [`apply_curve`] / [`invert_curve`] - Response curves applied to control values
//! - [`CtrlLink`] - Persisted description of one control-to-parameter link
//! - [`CtrlUnit`] - Live link state: accumulator, curve, scaling, notches
//! - [`ControlledParam`] - One absolute unit plus any number of modulators
//! - [`ControlMapper`] - Routes control changes to [`fxrig_core::ParamEvent`]s
//!
//! # Absolute and Relative Sources
//!
//! Pots, pedals, switches, MIDI and GUI controls report a position; the unit
//! stores it as is. Rotary encoders report steps; the unit accumulates them,
//! scaled by its step size, into a position kept in `[0, 1]`.
//!
//! # Example
//!
//! ```rust
//! use fxrig_core::{EventQueue, ParamDomain, ParamKey};
//! use fxrig_platform::{ControlMapper, ControlSource, ControlTarget, CtrlUnit};
//!
//! let (tx, rx) = EventQueue::bounded(16);
//! let mut mapper = ControlMapper::new();
//!
//! let knob = ControlSource::pot(0);
//! let target = ControlTarget::new(0, ParamKey::global(0));
//! mapper.bind(target, ParamDomain::Unipolar, CtrlUnit::new(knob, true)).unwrap();
//!
//! assert_eq!(mapper.handle(knob, 0.25, &tx).unwrap(), 1);
//! let mut events = Vec::with_capacity(16);
//! rx.drain_into(&mut events);
//! assert_eq!(events[0].value, 0.25);
//! ```

pub mod control_curve;
pub mod control_mapper;
pub mod controlled_param;
pub mod ctrl_link;
pub mod ctrl_unit;

use fxrig_core::EventError;
use serde::{Deserialize, Serialize};

pub use control_curve::{ControlCurve, apply_curve, invert_curve};
pub use control_mapper::{ControlMapper, ControlTarget};
pub use controlled_param::ControlledParam;
pub use ctrl_link::CtrlLink;
pub use ctrl_unit::{CtrlUnit, DEFAULT_NOTCH_TOLERANCE, DEFAULT_STEP};

/// Family of a control source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Potentiometer on the device.
    Pot,
    /// Expression pedal.
    Pedal,
    /// Incremental rotary encoder. Relative.
    Rotenc,
    /// Footswitch or toggle (0 or 1).
    Switch,
    /// MIDI continuous controller.
    Midi,
    /// On-screen control.
    Gui,
}

impl SourceKind {
    /// Returns true if the source reports steps instead of positions.
    #[inline]
    pub const fn is_relative(self) -> bool {
        matches!(self, SourceKind::Rotenc)
    }
}

/// Identifies one control.
///
/// # Example
///
/// ```rust
/// use fxrig_platform::{ControlSource, SourceKind};
///
/// let enc = ControlSource::rotenc(3);
/// assert_eq!(enc.kind, SourceKind::Rotenc);
/// assert_eq!(enc.index, 3);
/// assert!(enc.is_relative());
///
/// assert!(!ControlSource::midi(74).is_relative());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlSource {
    /// Source family.
    pub kind: SourceKind,
    /// Index within the family (pot number, CC number, ...).
    pub index: u16,
}

impl ControlSource {
    /// Creates a source from its parts.
    #[inline]
    pub const fn new(kind: SourceKind, index: u16) -> Self {
        Self { kind, index }
    }

    /// Potentiometer `index`.
    #[inline]
    pub const fn pot(index: u16) -> Self {
        Self::new(SourceKind::Pot, index)
    }

    /// Expression pedal `index`.
    #[inline]
    pub const fn pedal(index: u16) -> Self {
        Self::new(SourceKind::Pedal, index)
    }

    /// Rotary encoder `index`.
    #[inline]
    pub const fn rotenc(index: u16) -> Self {
        Self::new(SourceKind::Rotenc, index)
    }

    /// Switch `index`.
    #[inline]
    pub const fn switch(index: u16) -> Self {
        Self::new(SourceKind::Switch, index)
    }

    /// MIDI CC `cc`.
    #[inline]
    pub const fn midi(cc: u16) -> Self {
        Self::new(SourceKind::Midi, cc)
    }

    /// GUI control `index`.
    #[inline]
    pub const fn gui(index: u16) -> Self {
        Self::new(SourceKind::Gui, index)
    }

    /// Returns true if the source reports steps instead of positions.
    #[inline]
    pub const fn is_relative(&self) -> bool {
        self.kind.is_relative()
    }
}

/// Errors raised while building or driving control mappings.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ControlError {
    /// Step sizes must be finite and strictly positive.
    #[error("invalid step {0}: must be finite and > 0")]
    InvalidStep(f32),

    /// A parameter already has an absolute controller.
    #[error("parameter already has an absolute controller")]
    DuplicateAbsolute,

    /// The target parameter is not bound.
    #[error("no binding for module {slot}, parameter {index}")]
    UnknownTarget {
        /// Module slot.
        slot: usize,
        /// Parameter index.
        index: usize,
    },

    /// The event could not be posted.
    #[error("failed to post parameter event: {0}")]
    Event(#[from] EventError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_encoders_are_relative() {
        for kind in [
            SourceKind::Pot,
            SourceKind::Pedal,
            SourceKind::Switch,
            SourceKind::Midi,
            SourceKind::Gui,
        ] {
            assert!(!kind.is_relative());
        }
        assert!(SourceKind::Rotenc.is_relative());
    }

    #[test]
    fn sources_compare_by_kind_and_index() {
        assert_eq!(ControlSource::pot(1), ControlSource::new(SourceKind::Pot, 1));
        assert_ne!(ControlSource::pot(1), ControlSource::pedal(1));
        assert_ne!(ControlSource::pot(1), ControlSource::pot(2));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            ControlError::InvalidStep(-1.0).to_string(),
            "invalid step -1: must be finite and > 0"
        );
        assert_eq!(
            ControlError::from(EventError::QueueFull).to_string(),
            "failed to post parameter event: event queue is full"
        );
    }
}
