//! Parameter declarations.
//!
//! A module declares its parameters once, at construction, as a list of
//! [`ParamDesc`]. Each descriptor carries everything the automation engine
//! needs: the normalized domain, the natural-unit [`Curve`], the default
//! value and the ramp time used when the value changes.
//!
//! Parameters are addressed with a [`ParamKey`]: a category (global or
//! per-voice) and an index unique within that category.
//!
//! # Example
//!
//! ```rust
//! use fxrig_core::{ParamDesc, ParamUnit};
//!
//! let cutoff = ParamDesc::log("Cutoff", 20.0, 20000.0, ParamUnit::Hertz)
//!     .with_short_name("Freq")
//!     .with_default_nat(1000.0);
//!
//! let nat = cutoff.nrm_to_nat(cutoff.default);
//! assert!((nat - 1000.0).abs() < 0.01);
//! ```

use std::sync::Arc;

use crate::curve::{Curve, EnumCurve, LinearCurve, LogCurve, PowerCurve};

/// Ramp time applied to continuous parameters unless overridden, in seconds.
pub const DEFAULT_RAMP_TIME: f32 = 0.010;

/// Parameter category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ParamCateg {
    /// Shared by the whole module.
    #[default]
    Global,
    /// Replicated per voice (polyphonic modules).
    Voice,
}

impl ParamCateg {
    /// Number of categories.
    pub const COUNT: usize = 2;

    /// Every category, in index order.
    pub const ALL: [ParamCateg; Self::COUNT] = [ParamCateg::Global, ParamCateg::Voice];

    /// Dense index of the category, for per-category tables.
    #[inline]
    pub const fn as_index(self) -> usize {
        match self {
            ParamCateg::Global => 0,
            ParamCateg::Voice => 1,
        }
    }
}

/// Address of a parameter inside its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey {
    /// Category of the parameter.
    pub categ: ParamCateg,
    /// Index within the category.
    pub index: usize,
}

impl ParamKey {
    /// Global parameter `index`.
    #[inline]
    pub const fn global(index: usize) -> Self {
        Self {
            categ: ParamCateg::Global,
            index,
        }
    }

    /// Per-voice parameter `index`.
    #[inline]
    pub const fn voice(index: usize) -> Self {
        Self {
            categ: ParamCateg::Voice,
            index,
        }
    }
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        Self::global(index)
    }
}

/// Normalized domain of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamDomain {
    /// `[0, 1]`
    #[default]
    Unipolar,
    /// `[-1, 1]`
    Bipolar,
}

impl ParamDomain {
    /// Lower bound of the domain.
    #[inline]
    pub const fn min(self) -> f32 {
        match self {
            ParamDomain::Unipolar => 0.0,
            ParamDomain::Bipolar => -1.0,
        }
    }

    /// Upper bound of the domain.
    #[inline]
    pub const fn max(self) -> f32 {
        1.0
    }

    /// Clamps a normalized value into the domain. NaN maps to the lower bound.
    #[inline]
    pub fn clamp(self, val: f32) -> f32 {
        if val.is_nan() {
            self.min()
        } else {
            val.clamp(self.min(), self.max())
        }
    }

    /// Folds a domain value onto `[0, 1]`.
    #[inline]
    pub fn to_unipolar(self, val: f32) -> f32 {
        match self {
            ParamDomain::Unipolar => val,
            ParamDomain::Bipolar => (val + 1.0) * 0.5,
        }
    }

    /// Inverse of [`to_unipolar`](Self::to_unipolar).
    #[inline]
    pub fn from_unipolar(self, val: f32) -> f32 {
        match self {
            ParamDomain::Unipolar => val,
            ParamDomain::Bipolar => val * 2.0 - 1.0,
        }
    }
}

/// Unit type for parameter display and formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamUnit {
    /// Decibels (dB) - for gain, threshold, and level parameters.
    Decibels,

    /// Hertz (Hz) - for frequency parameters like filter cutoff or LFO rate.
    Hertz,

    /// Milliseconds (ms) - for time parameters like delay, attack, release.
    Milliseconds,

    /// Percentage (%) - for mix, blend, and normalized parameters.
    Percent,

    /// Ratio (n:1) - for compressor ratios and similar.
    Ratio,

    /// No unit - for dimensionless, enumerated or custom parameters.
    None,
}

impl ParamUnit {
    /// Returns the unit suffix string for display.
    ///
    /// ```rust
    /// use fxrig_core::ParamUnit;
    ///
    /// assert_eq!(ParamUnit::Decibels.suffix(), " dB");
    /// assert_eq!(ParamUnit::None.suffix(), "");
    /// ```
    pub const fn suffix(&self) -> &'static str {
        match self {
            ParamUnit::Decibels => " dB",
            ParamUnit::Hertz => " Hz",
            ParamUnit::Milliseconds => " ms",
            ParamUnit::Percent => "%",
            ParamUnit::Ratio => ":1",
            ParamUnit::None => "",
        }
    }
}

/// Describes one parameter of a module.
///
/// Cloning is cheap: the curve is shared.
#[derive(Debug, Clone)]
pub struct ParamDesc {
    /// Full parameter name for display.
    pub name: &'static str,

    /// Short name for hardware displays, 8 characters or less.
    pub short_name: &'static str,

    /// Unit used to format the natural value.
    pub unit: ParamUnit,

    /// Global or per-voice.
    pub categ: ParamCateg,

    /// Normalized domain.
    pub domain: ParamDomain,

    /// Default normalized value.
    pub default: f32,

    /// Ramp time in seconds. Zero makes changes land at the next block.
    pub ramp_time: f32,

    curve: Arc<dyn Curve>,
}

impl ParamDesc {
    /// Parameter with an arbitrary curve. Default is the bottom of the range.
    pub fn with_curve(name: &'static str, curve: impl Curve + 'static, unit: ParamUnit) -> Self {
        Self {
            name,
            short_name: name,
            unit,
            categ: ParamCateg::Global,
            domain: ParamDomain::Unipolar,
            default: 0.0,
            ramp_time: DEFAULT_RAMP_TIME,
            curve: Arc::new(curve),
        }
    }

    /// Linear parameter from `min` to `max`.
    pub fn linear(name: &'static str, min: f64, max: f64, unit: ParamUnit) -> Self {
        Self::with_curve(name, LinearCurve::new(min, max), unit)
    }

    /// Logarithmic parameter from `min` to `max` (both > 0).
    pub fn log(name: &'static str, min: f64, max: f64, unit: ParamUnit) -> Self {
        Self::with_curve(name, LogCurve::new(min, max), unit)
    }

    /// Power-law parameter from `min` to `max`.
    pub fn power(name: &'static str, min: f64, max: f64, exp: f64, unit: ParamUnit) -> Self {
        Self::with_curve(name, PowerCurve::new(min, max, exp), unit)
    }

    /// Enumerated parameter with `count` choices. Never ramps.
    pub fn enumerated(name: &'static str, count: u32) -> Self {
        Self::with_curve(name, EnumCurve::new(count), ParamUnit::None).with_ramp_time(0.0)
    }

    /// Sets the short display name.
    pub fn with_short_name(mut self, short_name: &'static str) -> Self {
        self.short_name = short_name;
        self
    }

    /// Sets the default as a normalized value (clamped).
    pub fn with_default(mut self, nrm: f32) -> Self {
        self.default = self.domain.clamp(nrm);
        self
    }

    /// Sets the default from a natural value.
    pub fn with_default_nat(mut self, nat: f32) -> Self {
        self.default = self.nat_to_nrm(nat);
        self
    }

    /// Sets the ramp time in seconds. Negative values mean no ramp.
    pub fn with_ramp_time(mut self, seconds: f32) -> Self {
        self.ramp_time = seconds.max(0.0);
        self
    }

    /// Makes the parameter bipolar (`[-1, 1]`). The default is remapped so
    /// that it keeps its natural value.
    pub fn bipolar(mut self) -> Self {
        let unipolar = self.domain.to_unipolar(self.default);
        self.domain = ParamDomain::Bipolar;
        self.default = self.domain.from_unipolar(unipolar);
        self
    }

    /// Moves the parameter to the per-voice category.
    pub fn voice(mut self) -> Self {
        self.categ = ParamCateg::Voice;
        self
    }

    /// The natural-unit curve.
    pub fn curve(&self) -> &dyn Curve {
        self.curve.as_ref()
    }

    /// Normalized value to natural units. Out-of-domain input is clamped.
    #[inline]
    pub fn nrm_to_nat(&self, nrm: f32) -> f32 {
        let u = self.domain.to_unipolar(self.domain.clamp(nrm));
        self.curve.forward(f64::from(u)) as f32
    }

    /// Natural units to normalized value in the parameter domain.
    #[inline]
    pub fn nat_to_nrm(&self, nat: f32) -> f32 {
        let u = self.curve.inverse(f64::from(nat)) as f32;
        self.domain.clamp(self.domain.from_unipolar(u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_conversion() {
        let desc = ParamDesc::linear("Mix", 0.0, 100.0, ParamUnit::Percent);
        assert_eq!(desc.nrm_to_nat(0.5), 50.0);
        assert_eq!(desc.nat_to_nrm(25.0), 0.25);
    }

    #[test]
    fn out_of_domain_is_clamped() {
        let desc = ParamDesc::linear("Gain", -60.0, 12.0, ParamUnit::Decibels);
        assert_eq!(desc.nrm_to_nat(3.0), 12.0);
        assert_eq!(desc.nrm_to_nat(-3.0), -60.0);
        assert_eq!(desc.nat_to_nrm(1000.0), 1.0);
    }

    #[test]
    fn bipolar_folds_onto_curve() {
        let desc = ParamDesc::linear("Pan", -100.0, 100.0, ParamUnit::Percent)
            .with_default_nat(0.0)
            .bipolar();
        assert_eq!(desc.domain, ParamDomain::Bipolar);
        assert_eq!(desc.default, 0.0);
        assert_eq!(desc.nrm_to_nat(-1.0), -100.0);
        assert_eq!(desc.nrm_to_nat(0.0), 0.0);
        assert_eq!(desc.nrm_to_nat(1.0), 100.0);
        assert_eq!(desc.nat_to_nrm(-50.0), -0.5);
    }

    #[test]
    fn enumerated_never_ramps() {
        let desc = ParamDesc::enumerated("Mode", 4);
        assert_eq!(desc.ramp_time, 0.0);
        assert_eq!(desc.nrm_to_nat(0.7), 2.0);
    }

    #[test]
    fn default_nat_for_log() {
        let desc = ParamDesc::log("Rate", 0.1, 10.0, ParamUnit::Hertz).with_default_nat(1.0);
        assert!((desc.default - 0.5).abs() < 1e-6);
    }

    #[test]
    fn voice_category() {
        let desc = ParamDesc::linear("Detune", -1.0, 1.0, ParamUnit::None).voice();
        assert_eq!(desc.categ, ParamCateg::Voice);
        assert_eq!(ParamKey::from(3), ParamKey::global(3));
    }

    #[test]
    fn domain_clamp_nan() {
        assert_eq!(ParamDomain::Bipolar.clamp(f32::NAN), -1.0);
        assert_eq!(ParamDomain::Unipolar.clamp(f32::NAN), 0.0);
    }

    #[test]
    fn negative_ramp_time_is_zero() {
        let desc = ParamDesc::linear("X", 0.0, 1.0, ParamUnit::None).with_ramp_time(-1.0);
        assert_eq!(desc.ramp_time, 0.0);
    }
}
