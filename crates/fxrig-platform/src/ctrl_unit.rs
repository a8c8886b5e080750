//! Live state of one control-to-parameter link.
//!
//! A [`CtrlUnit`] keeps the last position of its control, then turns it into
//! a normalized contribution:
//!
//! 1. `mod = val`, or `2 * val - 1` when the unit converts unipolar controls
//!    to bipolar contributions;
//! 2. `mod` is shaped by the response curve, mirrored when `amp < 0`;
//! 3. the shaped value is scaled by `amp`.
//!
//! An absolute unit adds its contribution to `base`; an additive unit adds it
//! to the current parameter value. The result snaps to the nearest notch
//! within tolerance, then is clamped to the parameter domain.

use fxrig_core::ParamDomain;

use crate::control_curve::{ControlCurve, apply_curve, invert_curve};
use crate::ctrl_link::{CtrlLink, is_eq};
use crate::{ControlError, ControlSource};

/// Default increment per encoder step.
pub const DEFAULT_STEP: f32 = 0.01;

/// Default snapping distance around notches, in normalized units.
pub const DEFAULT_NOTCH_TOLERANCE: f32 = 0.02;

/// One control driving (or modulating) one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct CtrlUnit {
    /// Control driving the parameter.
    pub source: ControlSource,
    /// Response curve.
    pub curve: ControlCurve,
    /// Maps a `0..1` control onto `-1..1` before shaping.
    pub u2b: bool,
    /// Absolute (replaces the value) or additive (modulates it).
    pub abs: bool,
    /// Normalized starting point of absolute units.
    pub base: f32,
    /// Normalized scale. Negative values invert the direction.
    pub amp: f32,
    /// Snapping distance around notches.
    pub notch_tolerance: f32,
    step: f32,
    val: f32,
    notches: Vec<f32>,
}

impl CtrlUnit {
    /// Linear unit with unit gain, no notch and the default step.
    pub fn new(source: ControlSource, abs: bool) -> Self {
        Self {
            source,
            curve: ControlCurve::Linear,
            u2b: false,
            abs,
            base: 0.0,
            amp: 1.0,
            notch_tolerance: DEFAULT_NOTCH_TOLERANCE,
            step: DEFAULT_STEP,
            val: 0.0,
            notches: Vec::new(),
        }
    }

    /// Builds a unit from its persisted form.
    ///
    /// Fails with [`ControlError::InvalidStep`] if the step is not finite
    /// and strictly positive. Direction reversal is expressed with a
    /// negative `amp`, never with a negative step.
    pub fn from_link(link: &CtrlLink) -> Result<Self, ControlError> {
        let mut unit = Self::new(link.source, link.abs);
        unit.set_step(link.step)?;
        unit.curve = link.curve;
        unit.u2b = link.u2b;
        unit.base = link.base;
        unit.amp = link.amp;
        unit.set_notches(link.notches.iter().copied());
        Ok(unit)
    }

    /// Persisted form of the unit.
    pub fn to_link(&self) -> CtrlLink {
        CtrlLink {
            source: self.source,
            step: self.step,
            curve: self.curve,
            base: self.base,
            amp: self.amp,
            u2b: self.u2b,
            abs: self.abs,
            notches: self.notches.clone(),
        }
    }

    /// Increment per encoder step.
    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Sets the increment per encoder step.
    pub fn set_step(&mut self, step: f32) -> Result<(), ControlError> {
        if step.is_finite() && step > 0.0 {
            self.step = step;
            Ok(())
        } else {
            Err(ControlError::InvalidStep(step))
        }
    }

    /// Current control position: `-1..1`, or `0..1` for relative sources.
    #[inline]
    pub fn val(&self) -> f32 {
        self.val
    }

    /// Notch positions, sorted and unique.
    #[inline]
    pub fn notches(&self) -> &[f32] {
        &self.notches
    }

    /// Replaces the notches. Non-finite values are dropped, duplicates merged.
    pub fn set_notches(&mut self, notches: impl IntoIterator<Item = f32>) {
        self.notches.clear();
        self.notches
            .extend(notches.into_iter().filter(|n| n.is_finite()));
        self.notches.sort_by(f32::total_cmp);
        self.notches.dedup();
    }

    /// Feeds a raw control value.
    ///
    /// Relative sources add `raw * step` to the position and keep it in
    /// `0..1`; absolute sources store `raw` clamped to `-1..1`.
    pub fn update_abs_val(&mut self, raw: f32) {
        if raw.is_nan() {
            return;
        }
        self.val = if self.source.is_relative() {
            (self.val + raw * self.step).clamp(0.0, 1.0)
        } else {
            raw.clamp(-1.0, 1.0)
        };
    }

    /// Moves the position so that an absolute unit evaluates to `nrm`,
    /// e.g. after a preset change, so that the next encoder step continues
    /// from the current parameter value. Additive units are left untouched.
    pub fn update_internal_val(&mut self, nrm: f32) {
        if !self.abs || self.amp == 0.0 || nrm.is_nan() {
            return;
        }
        let shaped = ((nrm - self.base) / self.amp).clamp(-1.0, 1.0);
        let modulation = invert_curve(shaped, self.curve, self.amp < 0.0);
        let val = if self.u2b {
            (modulation + 1.0) * 0.5
        } else {
            modulation
        };
        self.val = if self.source.is_relative() {
            val.clamp(0.0, 1.0)
        } else {
            val.clamp(-1.0, 1.0)
        };
    }

    /// Shaped and scaled contribution of the current position.
    #[inline]
    pub fn contribution(&self) -> f32 {
        let modulation = if self.u2b {
            self.val * 2.0 - 1.0
        } else {
            self.val
        };
        apply_curve(modulation, self.curve, self.amp < 0.0) * self.amp
    }

    /// Notch closest to `val` within tolerance.
    pub fn nearest_notch(&self, val: f32) -> Option<f32> {
        let pos = self.notches.partition_point(|&n| n < val);
        let below = pos.checked_sub(1).map(|i| self.notches[i]);
        let above = self.notches.get(pos).copied();
        let best = match (below, above) {
            (Some(b), Some(a)) => {
                if val - b <= a - val {
                    b
                } else {
                    a
                }
            }
            (Some(n), None) | (None, Some(n)) => n,
            (None, None) => return None,
        };
        ((best - val).abs() <= self.notch_tolerance).then_some(best)
    }

    /// Value of the parameter when driven by this unit alone.
    ///
    /// `param_val` is the current normalized value; absolute units ignore it
    /// and start from `base`.
    pub fn evaluate(&self, param_val: f32, domain: ParamDomain) -> f32 {
        let start = if self.abs { self.base } else { param_val };
        let val = start + self.contribution();
        domain.clamp(self.nearest_notch(val).unwrap_or(val))
    }

    /// Returns true if both units describe the same mapping. Positions are
    /// not compared; `abs` and the notch tolerance are.
    pub fn is_similar(&self, other: &Self) -> bool {
        self.source == other.source
            && self.curve == other.curve
            && self.u2b == other.u2b
            && self.abs == other.abs
            && is_eq(self.step, other.step)
            && is_eq(self.base, other.base)
            && is_eq(self.amp, other.amp)
            && is_eq(self.notch_tolerance, other.notch_tolerance)
            && self.notches.len() == other.notches.len()
            && self
                .notches
                .iter()
                .zip(&other.notches)
                .all(|(&a, &b)| is_eq(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_source_is_clamped() {
        let mut u = CtrlUnit::new(ControlSource::pot(0), true);
        u.update_abs_val(1.7);
        assert_eq!(u.val(), 1.0);
        u.update_abs_val(-3.0);
        assert_eq!(u.val(), -1.0);
    }

    #[test]
    fn relative_source_accumulates_in_unit_range() {
        let mut u = CtrlUnit::new(ControlSource::rotenc(0), true);
        u.set_step(0.1).unwrap();
        u.update_abs_val(3.0);
        assert!((u.val() - 0.3).abs() < 1e-6);
        u.update_abs_val(-5.0);
        assert_eq!(u.val(), 0.0);
        u.update_abs_val(100.0);
        assert_eq!(u.val(), 1.0);
    }

    #[test]
    fn invalid_steps_are_rejected() {
        let mut u = CtrlUnit::new(ControlSource::rotenc(0), false);
        assert_eq!(u.set_step(0.0), Err(ControlError::InvalidStep(0.0)));
        assert_eq!(u.set_step(-0.1), Err(ControlError::InvalidStep(-0.1)));
        assert!(u.set_step(f32::INFINITY).is_err());
        assert_eq!(u.step(), DEFAULT_STEP);

        let link = CtrlLink {
            step: -1.0,
            ..CtrlLink::new(ControlSource::rotenc(0), false)
        };
        assert_eq!(
            CtrlUnit::from_link(&link),
            Err(ControlError::InvalidStep(-1.0))
        );
    }

    #[test]
    fn absolute_unit_starts_from_base() {
        let mut u = CtrlUnit::new(ControlSource::pedal(0), true);
        u.base = 0.2;
        u.amp = 0.5;
        u.update_abs_val(1.0);
        assert!((u.evaluate(0.9, ParamDomain::Unipolar) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn additive_unit_starts_from_param_value() {
        let mut u = CtrlUnit::new(ControlSource::pedal(0), false);
        u.amp = 0.1;
        u.update_abs_val(1.0);
        assert!((u.evaluate(0.5, ParamDomain::Unipolar) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn u2b_maps_center_to_zero() {
        let mut u = CtrlUnit::new(ControlSource::pot(0), false);
        u.u2b = true;
        u.update_abs_val(0.5);
        assert_eq!(u.contribution(), 0.0);
        u.update_abs_val(0.0);
        assert_eq!(u.contribution(), -1.0);
    }

    #[test]
    fn negative_amp_inverts_and_mirrors_curve() {
        let mut u = CtrlUnit::new(ControlSource::pot(0), true);
        u.curve = ControlCurve::Slow;
        u.base = 1.0;
        u.amp = -1.0;
        u.update_abs_val(0.5);
        // Mirrored slow curve at 0.5 gives 0.75
        assert!((u.evaluate(0.0, ParamDomain::Unipolar) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn notch_snaps_within_tolerance() {
        let eps = 0.01;
        let mut u = CtrlUnit::new(ControlSource::pot(0), true);
        u.notch_tolerance = eps;
        u.set_notches([0.5]);
        u.update_abs_val(0.5 + eps / 2.0);
        assert_eq!(u.evaluate(0.0, ParamDomain::Unipolar), 0.5);

        u.update_abs_val(0.5 + eps * 2.0);
        assert!(u.evaluate(0.0, ParamDomain::Unipolar) > 0.5);
    }

    #[test]
    fn nearest_of_two_notches_wins() {
        let mut u = CtrlUnit::new(ControlSource::pot(0), true);
        u.notch_tolerance = 0.2;
        u.set_notches([0.6, 0.4, 0.4, f32::NAN]);
        assert_eq!(u.notches(), &[0.4, 0.6]);
        assert_eq!(u.nearest_notch(0.45), Some(0.4));
        assert_eq!(u.nearest_notch(0.58), Some(0.6));
        assert_eq!(u.nearest_notch(0.95), None);
    }

    #[test]
    fn result_is_clamped_to_domain() {
        let mut u = CtrlUnit::new(ControlSource::pot(0), false);
        u.update_abs_val(1.0);
        assert_eq!(u.evaluate(0.8, ParamDomain::Unipolar), 1.0);
        u.update_abs_val(-1.0);
        assert_eq!(u.evaluate(-0.5, ParamDomain::Bipolar), -1.0);
    }

    #[test]
    fn internal_val_tracks_parameter() {
        let mut u = CtrlUnit::new(ControlSource::rotenc(0), true);
        u.curve = ControlCurve::S1;
        u.base = 0.1;
        u.amp = 0.8;
        u.update_internal_val(0.5);
        assert!((u.evaluate(0.0, ParamDomain::Unipolar) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn link_round_trip_preserves_similarity() {
        let mut u = CtrlUnit::new(ControlSource::midi(7), true);
        u.curve = ControlCurve::Fast;
        u.set_notches([0.0, 1.0]);
        let back = CtrlUnit::from_link(&u.to_link()).unwrap();
        assert!(u.is_similar(&back));
    }
}
