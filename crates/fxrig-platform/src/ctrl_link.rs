//! Persisted control links.
//!
//! A [`CtrlLink`] is the stored form of a control-to-parameter association,
//! as found in configuration files and presets. It is plain data; turning it
//! into a live [`CtrlUnit`](crate::CtrlUnit) validates it.

use serde::{Deserialize, Serialize};

use crate::ControlSource;
use crate::control_curve::ControlCurve;
use crate::ctrl_unit::DEFAULT_STEP;

/// Tolerance used by [`CtrlLink::is_similar`].
pub const SIMILARITY_TOLERANCE: f32 = 1e-5;

/// Stored description of one control-to-parameter link.
///
/// Everything except `source` has a default, so a minimal TOML entry only
/// needs the source:
///
/// ```rust
/// use fxrig_platform::{ControlCurve, ControlSource, CtrlLink};
///
/// let link: CtrlLink = toml::from_str(r#"
///     source = { kind = "pedal", index = 0 }
///     curve = "slow"
///     abs = true
/// "#).unwrap();
///
/// assert_eq!(link.source, ControlSource::pedal(0));
/// assert_eq!(link.curve, ControlCurve::Slow);
/// assert_eq!(link.amp, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtrlLink {
    /// Control driving the parameter.
    pub source: ControlSource,

    /// Increment per encoder step. Only used by relative sources.
    #[serde(default = "default_step")]
    pub step: f32,

    /// Response curve.
    #[serde(default)]
    pub curve: ControlCurve,

    /// Normalized value the absolute controller starts from.
    #[serde(default)]
    pub base: f32,

    /// Normalized scale. Negative values invert the direction.
    #[serde(default = "default_amp")]
    pub amp: f32,

    /// Maps a `0..1` control onto `-1..1` before shaping.
    #[serde(default)]
    pub u2b: bool,

    /// Absolute (replaces the value) or additive (modulates it).
    #[serde(default)]
    pub abs: bool,

    /// Normalized values the result snaps to.
    #[serde(default)]
    pub notches: Vec<f32>,
}

fn default_step() -> f32 {
    DEFAULT_STEP
}

fn default_amp() -> f32 {
    1.0
}

impl CtrlLink {
    /// Link with default settings for `source`.
    pub fn new(source: ControlSource, abs: bool) -> Self {
        Self {
            source,
            step: DEFAULT_STEP,
            curve: ControlCurve::Linear,
            base: 0.0,
            amp: 1.0,
            u2b: false,
            abs,
            notches: Vec::new(),
        }
    }

    /// Returns true if both links describe the same mapping.
    ///
    /// Scalars are compared within [`SIMILARITY_TOLERANCE`], notches
    /// element by element after sorting. `abs` is compared too, so an
    /// absolute and a relative link on the same source never match.
    pub fn is_similar(&self, other: &Self) -> bool {
        if self.source != other.source
            || self.curve != other.curve
            || self.u2b != other.u2b
            || self.abs != other.abs
            || !is_eq(self.step, other.step)
            || !is_eq(self.base, other.base)
            || !is_eq(self.amp, other.amp)
            || self.notches.len() != other.notches.len()
        {
            return false;
        }
        let mut a = self.notches.clone();
        let mut b = other.notches.clone();
        a.sort_by(f32::total_cmp);
        b.sort_by(f32::total_cmp);
        a.iter().zip(&b).all(|(&x, &y)| is_eq(x, y))
    }
}

pub(crate) fn is_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= SIMILARITY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> CtrlLink {
        CtrlLink {
            notches: vec![0.5, 0.25],
            ..CtrlLink::new(ControlSource::pot(2), true)
        }
    }

    #[test]
    fn similar_within_tolerance() {
        let a = link();
        let mut b = link();
        b.base += 5e-6;
        b.notches = vec![0.25, 0.500_001];
        assert!(a.is_similar(&b));
    }

    #[test]
    fn different_scalars_are_not_similar() {
        let a = link();
        let mut b = link();
        b.amp = 0.9;
        assert!(!a.is_similar(&b));
    }

    #[test]
    fn different_flags_are_not_similar() {
        let a = link();
        let mut b = link();
        b.u2b = true;
        assert!(!a.is_similar(&b));

        let mut c = link();
        c.curve = ControlCurve::S1;
        assert!(!a.is_similar(&c));

        let mut d = link();
        d.source = ControlSource::pot(3);
        assert!(!a.is_similar(&d));
    }

    #[test]
    fn absolute_and_relative_links_differ() {
        let a = link();
        let mut b = link();
        b.abs = false;
        assert!(!a.is_similar(&b));
        assert!(!b.is_similar(&a));
    }

    #[test]
    fn notch_count_matters() {
        let a = link();
        let mut b = link();
        b.notches.push(0.75);
        assert!(!a.is_similar(&b));
    }

    #[test]
    fn toml_round_trip() {
        let a = link();
        let text = toml::to_string(&a).unwrap();
        let b: CtrlLink = toml::from_str(&text).unwrap();
        assert_eq!(a, b);
    }
}
