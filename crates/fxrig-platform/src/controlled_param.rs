//! Several controls acting on one parameter.

use fxrig_core::ParamDomain;

use crate::ctrl_unit::CtrlUnit;
use crate::{ControlError, ControlSource};

/// The controls bound to one parameter: at most one absolute unit, which
/// sets the value, plus any number of additive units modulating it.
///
/// ```rust
/// use fxrig_core::ParamDomain;
/// use fxrig_platform::{ControlSource, ControlledParam, CtrlUnit};
///
/// let mut param = ControlledParam::new();
/// for i in 0..2 {
///     let mut lfo = CtrlUnit::new(ControlSource::gui(i), false);
///     lfo.amp = 0.1;
///     lfo.update_abs_val(1.0);
///     param.add(lfo).unwrap();
/// }
/// assert!((param.compute(0.0, ParamDomain::Unipolar) - 0.2).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ControlledParam {
    abs: Option<CtrlUnit>,
    mods: Vec<CtrlUnit>,
}

impl ControlledParam {
    /// No control bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a unit. A second absolute unit is rejected.
    pub fn add(&mut self, unit: CtrlUnit) -> Result<(), ControlError> {
        if unit.abs {
            if self.abs.is_some() {
                return Err(ControlError::DuplicateAbsolute);
            }
            self.abs = Some(unit);
        } else {
            self.mods.push(unit);
        }
        Ok(())
    }

    /// Unbinds every unit driven by `source`. Returns how many were removed.
    pub fn remove(&mut self, source: ControlSource) -> usize {
        let before = self.len();
        if self.abs.as_ref().is_some_and(|u| u.source == source) {
            self.abs = None;
        }
        self.mods.retain(|u| u.source != source);
        before - self.len()
    }

    /// Number of bound units.
    pub fn len(&self) -> usize {
        usize::from(self.abs.is_some()) + self.mods.len()
    }

    /// Returns true if no unit is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The absolute unit, if any.
    pub fn abs_unit(&self) -> Option<&CtrlUnit> {
        self.abs.as_ref()
    }

    /// Additive units, in binding order.
    pub fn mods(&self) -> &[CtrlUnit] {
        &self.mods
    }

    /// All units, absolute first.
    pub fn units(&self) -> impl Iterator<Item = &CtrlUnit> {
        self.abs.iter().chain(self.mods.iter())
    }

    /// All units, mutable.
    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut CtrlUnit> {
        self.abs.iter_mut().chain(self.mods.iter_mut())
    }

    /// Returns true if a unit is driven by `source`.
    pub fn uses(&self, source: ControlSource) -> bool {
        self.units().any(|u| u.source == source)
    }

    /// Combined normalized value.
    ///
    /// Starts from the absolute unit (or `param_val` without one), adds every
    /// additive contribution, snaps to the first notch in range (absolute
    /// unit first) and clamps once at the end.
    pub fn compute(&self, param_val: f32, domain: ParamDomain) -> f32 {
        let mut val = match &self.abs {
            Some(unit) => unit.base + unit.contribution(),
            None => param_val,
        };
        for unit in &self.mods {
            val += unit.contribution();
        }
        if let Some(notch) = self.units().find_map(|u| u.nearest_notch(val)) {
            val = notch;
        }
        domain.clamp(val)
    }
}
