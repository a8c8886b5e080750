//! Routing control changes to parameter events.
//!
//! [`ControlMapper`] owns every live binding. When a control moves, it
//! updates the units driven by that control, recomputes each affected
//! parameter and posts one [`ParamEvent`] per parameter to the audio thread.
//!
//! # Example
//!
//! ```rust
//! use fxrig_core::{EventQueue, ParamDomain, ParamKey};
//! use fxrig_platform::{ControlMapper, ControlSource, ControlTarget, CtrlUnit};
//!
//! let (tx, rx) = EventQueue::bounded(8);
//! let mut mapper = ControlMapper::new();
//! let target = ControlTarget::new(1, ParamKey::global(2));
//!
//! // Pedal modulates around the preset value.
//! let mut pedal = CtrlUnit::new(ControlSource::pedal(0), false);
//! pedal.amp = 0.25;
//! mapper.bind(target, ParamDomain::Unipolar, pedal).unwrap();
//! mapper.set_base(target, 0.5).unwrap();
//!
//! mapper.handle(ControlSource::pedal(0), 1.0, &tx).unwrap();
//! let mut events = Vec::with_capacity(8);
//! rx.drain_into(&mut events);
//! assert_eq!(events[0].value, 0.75);
//! ```

use fxrig_core::{EventSender, ParamDomain, ParamEvent, ParamKey};

use crate::controlled_param::ControlledParam;
use crate::ctrl_link::CtrlLink;
use crate::ctrl_unit::CtrlUnit;
use crate::{ControlError, ControlSource};

/// A parameter of one module in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlTarget {
    /// Position of the module in the chain.
    pub slot: usize,
    /// Parameter inside the module.
    pub key: ParamKey,
}

impl ControlTarget {
    /// Creates a target.
    #[inline]
    pub const fn new(slot: usize, key: ParamKey) -> Self {
        Self { slot, key }
    }
}

#[derive(Debug, Clone)]
struct Binding {
    target: ControlTarget,
    domain: ParamDomain,
    /// Normalized value additive units modulate around.
    base: f32,
    param: ControlledParam,
}

impl Binding {
    fn value(&self) -> f32 {
        self.param.compute(self.base, self.domain)
    }
}

/// Table of control bindings.
#[derive(Debug, Clone, Default)]
pub struct ControlMapper {
    bindings: Vec<Binding>,
}

impl ControlMapper {
    /// Empty mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bound parameters, in binding order.
    pub fn targets(&self) -> impl Iterator<Item = ControlTarget> + '_ {
        self.bindings.iter().map(|b| b.target)
    }

    /// Binds `unit` to `target`.
    ///
    /// The first binding of a target fixes its domain. Fails with
    /// [`ControlError::DuplicateAbsolute`] if the target already has an
    /// absolute unit and `unit` is absolute too.
    pub fn bind(
        &mut self,
        target: ControlTarget,
        domain: ParamDomain,
        unit: CtrlUnit,
    ) -> Result<(), ControlError> {
        let source = unit.source;
        let abs = unit.abs;
        match self.bindings.iter_mut().find(|b| b.target == target) {
            Some(binding) => binding.param.add(unit)?,
            None => {
                let mut param = ControlledParam::new();
                param.add(unit)?;
                self.bindings.push(Binding {
                    target,
                    domain,
                    base: 0.0,
                    param,
                });
            }
        }
        tracing::debug!(
            slot = target.slot,
            param = target.key.index,
            ?source,
            abs,
            "control bound"
        );
        Ok(())
    }

    /// Binds a persisted link to `target`.
    pub fn bind_link(
        &mut self,
        target: ControlTarget,
        domain: ParamDomain,
        link: &CtrlLink,
    ) -> Result<(), ControlError> {
        self.bind(target, domain, CtrlUnit::from_link(link)?)
    }

    /// Sets the value a parameter takes without control input, e.g. after a
    /// preset load.
    ///
    /// Additive units modulate around it; absolute units move their position
    /// so that the next relative step continues from it.
    pub fn set_base(&mut self, target: ControlTarget, nrm: f32) -> Result<(), ControlError> {
        let binding = self.binding_mut(target)?;
        binding.base = binding.domain.clamp(nrm);
        for unit in binding.param.units_mut().filter(|u| u.abs) {
            unit.update_internal_val(binding.base);
        }
        Ok(())
    }

    /// Current normalized value of a bound parameter.
    pub fn value(&self, target: ControlTarget) -> Option<f32> {
        self.bindings
            .iter()
            .find(|b| b.target == target)
            .map(Binding::value)
    }

    /// Units bound to `target`.
    pub fn controls(&self, target: ControlTarget) -> Option<&ControlledParam> {
        self.bindings
            .iter()
            .find(|b| b.target == target)
            .map(|b| &b.param)
    }

    /// Removes every unit driven by `source`. Parameters left without units
    /// are unbound. Returns the number of removed units.
    pub fn unbind(&mut self, source: ControlSource) -> usize {
        let removed = self
            .bindings
            .iter_mut()
            .map(|b| b.param.remove(source))
            .sum();
        self.bindings.retain(|b| !b.param.is_empty());
        removed
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Feeds a raw control value and posts the new value of every parameter
    /// it drives. Returns the number of events posted.
    ///
    /// The units are updated even if posting fails, so a later control
    /// change still starts from the right position.
    pub fn handle(
        &mut self,
        source: ControlSource,
        raw: f32,
        tx: &EventSender,
    ) -> Result<usize, ControlError> {
        let mut posted = 0;
        let mut first_err = None;
        for binding in self.bindings.iter_mut().filter(|b| b.param.uses(source)) {
            for unit in binding.param.units_mut().filter(|u| u.source == source) {
                unit.update_abs_val(raw);
            }
            let value = binding.value();
            let event = ParamEvent::new(binding.target.slot, binding.target.key, value);
            match tx.post(event) {
                Ok(()) => posted += 1,
                Err(err) => {
                    tracing::warn!(slot = binding.target.slot, %err, "control event dropped");
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(posted),
        }
    }

    fn binding_mut(&mut self, target: ControlTarget) -> Result<&mut Binding, ControlError> {
        self.bindings
            .iter_mut()
            .find(|b| b.target == target)
            .ok_or(ControlError::UnknownTarget {
                slot: target.slot,
                index: target.key.index,
            })
    }
}

#[cfg(test)]
mod tests {
    use fxrig_core::{EventError, EventQueue, EventReceiver};

    use super::*;
    use crate::ControlCurve;

    fn drain(rx: &EventReceiver) -> Vec<ParamEvent> {
        let mut out = Vec::with_capacity(64);
        rx.drain_into(&mut out);
        out
    }

    fn target(slot: usize, index: usize) -> ControlTarget {
        ControlTarget::new(slot, ParamKey::global(index))
    }

    #[test]
    fn unbound_source_posts_nothing() {
        let (tx, rx) = EventQueue::bounded(8);
        let mut mapper = ControlMapper::new();
        assert_eq!(mapper.handle(ControlSource::pot(0), 0.5, &tx), Ok(0));
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn one_source_can_drive_several_params() {
        let (tx, rx) = EventQueue::bounded(8);
        let mut mapper = ControlMapper::new();
        let pedal = ControlSource::pedal(0);
        mapper
            .bind(target(0, 0), ParamDomain::Unipolar, CtrlUnit::new(pedal, true))
            .unwrap();
        let mut inverted = CtrlUnit::new(pedal, true);
        inverted.base = 1.0;
        inverted.amp = -1.0;
        mapper
            .bind(target(1, 3), ParamDomain::Unipolar, inverted)
            .unwrap();

        assert_eq!(mapper.handle(pedal, 0.25, &tx), Ok(2));
        let events = drain(&rx);
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].slot, events[0].value), (0, 0.25));
        assert_eq!((events[1].slot, events[1].key.index), (1, 3));
        assert!((events[1].value - 0.75).abs() < 1e-6);
    }

    #[test]
    fn second_absolute_binding_is_rejected() {
        let mut mapper = ControlMapper::new();
        let t = target(0, 0);
        mapper
            .bind(t, ParamDomain::Unipolar, CtrlUnit::new(ControlSource::pot(0), true))
            .unwrap();
        assert_eq!(
            mapper.bind(t, ParamDomain::Unipolar, CtrlUnit::new(ControlSource::pot(1), true)),
            Err(ControlError::DuplicateAbsolute)
        );
        assert_eq!(mapper.controls(t).map(ControlledParam::len), Some(1));
    }

    #[test]
    fn modulators_combine_around_base() {
        let (tx, rx) = EventQueue::bounded(8);
        let mut mapper = ControlMapper::new();
        let t = target(0, 1);
        for i in 0..2 {
            let mut unit = CtrlUnit::new(ControlSource::gui(i), false);
            unit.amp = 0.1;
            mapper.bind(t, ParamDomain::Unipolar, unit).unwrap();
        }
        mapper.set_base(t, 0.5).unwrap();
        mapper.handle(ControlSource::gui(0), 1.0, &tx).unwrap();
        mapper.handle(ControlSource::gui(1), 1.0, &tx).unwrap();

        let events = drain(&rx);
        assert!((events[0].value - 0.6).abs() < 1e-6);
        assert!((events[1].value - 0.7).abs() < 1e-6);
    }

    #[test]
    fn encoder_continues_from_base() {
        let (tx, rx) = EventQueue::bounded(8);
        let mut mapper = ControlMapper::new();
        let enc = ControlSource::rotenc(0);
        let t = target(0, 0);
        let mut unit = CtrlUnit::new(enc, true);
        unit.set_step(0.05).unwrap();
        mapper.bind(t, ParamDomain::Unipolar, unit).unwrap();
        mapper.set_base(t, 0.4).unwrap();

        mapper.handle(enc, 2.0, &tx).unwrap();
        let events = drain(&rx);
        assert!((events[0].value - 0.5).abs() < 1e-5);
    }

    #[test]
    fn curve_is_applied_before_posting() {
        let (tx, rx) = EventQueue::bounded(8);
        let mut mapper = ControlMapper::new();
        let mut unit = CtrlUnit::new(ControlSource::midi(74), true);
        unit.curve = ControlCurve::Slow;
        mapper.bind(target(0, 0), ParamDomain::Unipolar, unit).unwrap();
        mapper.handle(ControlSource::midi(74), 0.5, &tx).unwrap();
        assert!((drain(&rx)[0].value - 0.25).abs() < 1e-6);
    }

    #[test]
    fn unbind_drops_empty_targets() {
        let mut mapper = ControlMapper::new();
        let pot = ControlSource::pot(0);
        mapper
            .bind(target(0, 0), ParamDomain::Unipolar, CtrlUnit::new(pot, true))
            .unwrap();
        mapper
            .bind(target(0, 1), ParamDomain::Unipolar, CtrlUnit::new(pot, true))
            .unwrap();
        mapper
            .bind(
                target(0, 1),
                ParamDomain::Unipolar,
                CtrlUnit::new(ControlSource::pedal(0), false),
            )
            .unwrap();

        assert_eq!(mapper.unbind(pot), 2);
        assert_eq!(mapper.targets().collect::<Vec<_>>(), vec![target(0, 1)]);
    }

    #[test]
    fn set_base_on_unknown_target_fails() {
        let mut mapper = ControlMapper::new();
        assert_eq!(
            mapper.set_base(target(3, 4), 0.5),
            Err(ControlError::UnknownTarget { slot: 3, index: 4 })
        );
    }

    #[test]
    fn full_queue_is_reported() {
        let (tx, _rx) = EventQueue::bounded(1);
        let mut mapper = ControlMapper::new();
        let pot = ControlSource::pot(0);
        mapper
            .bind(target(0, 0), ParamDomain::Unipolar, CtrlUnit::new(pot, true))
            .unwrap();
        assert_eq!(mapper.handle(pot, 0.1, &tx), Ok(1));
        assert_eq!(
            mapper.handle(pot, 0.9, &tx),
            Err(ControlError::Event(EventError::QueueFull))
        );
        assert_eq!(mapper.value(target(0, 0)), Some(0.9));
    }
}
