//! Natural-unit curves for parameter normalization.
//!
//! Every parameter lives in a normalized domain for automation and control
//! mapping, and in natural units (Hz, dB, ms, ...) for DSP code. A [`Curve`]
//! converts between the two. Curves work on the unipolar `[0, 1]` range;
//! bipolar parameters are folded onto it by [`ParamDesc`](crate::ParamDesc).
//!
//! # Provided Curves
//!
//! - [`LinearCurve`]: `nat = min + x * (max - min)`
//! - [`LogCurve`]: `nat = min * (max / min)^x`, for frequencies and times
//! - [`PiecewiseLogCurve`]: log-linear segments between breakpoints
//! - [`PowerCurve`]: `nat = min + x^exp * (max - min)` (skew factor)
//! - [`EnumCurve`]: integer index over `count` choices
//! - [`FnCurve`]: user supplied monotonic pair
//!
//! Inputs outside the domain are clamped, never rejected. Computations run in
//! `f64` so that `inverse(forward(x))` stays within `1e-5` relative error.

use core::fmt;

/// Smallest natural value accepted by logarithmic curves.
const LOG_FLOOR: f64 = 1e-12;

/// Monotonic mapping between the normalized `[0, 1]` range and natural units.
pub trait Curve: fmt::Debug + Send + Sync {
    /// Normalized value to natural units. Input is clamped to `[0, 1]`.
    fn forward(&self, nrm: f64) -> f64;

    /// Natural units to normalized value, clamped to `[0, 1]`.
    fn inverse(&self, nat: f64) -> f64;

    /// Natural value at normalized `0`.
    fn nat_min(&self) -> f64 {
        self.forward(0.0)
    }

    /// Natural value at normalized `1`.
    fn nat_max(&self) -> f64 {
        self.forward(1.0)
    }
}

/// Errors raised when a curve cannot be built from its breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CurveError {
    /// Fewer than two breakpoints were given.
    #[error("a piecewise curve needs at least two points, got {0}")]
    TooFewPoints(usize),

    /// Breakpoints are not strictly increasing in both coordinates.
    #[error("breakpoint {0} is not strictly increasing")]
    NotMonotonic(usize),

    /// Normalized breakpoints must start at 0 and end at 1.
    #[error("breakpoints must span the normalized range [0, 1]")]
    IncompleteRange,
}

#[inline]
fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Linear mapping. Equal resolution across the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearCurve {
    min: f64,
    max: f64,
}

impl LinearCurve {
    /// Creates a linear curve from `min` (at 0) to `max` (at 1).
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Curve for LinearCurve {
    #[inline]
    fn forward(&self, nrm: f64) -> f64 {
        self.min + clamp_unit(nrm) * (self.max - self.min)
    }

    #[inline]
    fn inverse(&self, nat: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            return 0.0;
        }
        clamp_unit((nat - self.min) / range)
    }
}

/// Logarithmic mapping, more resolution at low values.
///
/// Both ends must be positive; non-positive bounds are raised to a tiny
/// positive floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogCurve {
    log_min: f64,
    log_range: f64,
}

impl LogCurve {
    /// Creates a logarithmic curve from `min` to `max` (both > 0).
    pub fn new(min: f64, max: f64) -> Self {
        let log_min = libm::log(min.max(LOG_FLOOR));
        let log_max = libm::log(max.max(LOG_FLOOR));
        Self {
            log_min,
            log_range: log_max - log_min,
        }
    }
}

impl Curve for LogCurve {
    #[inline]
    fn forward(&self, nrm: f64) -> f64 {
        libm::exp(self.log_min + clamp_unit(nrm) * self.log_range)
    }

    #[inline]
    fn inverse(&self, nat: f64) -> f64 {
        if self.log_range == 0.0 {
            return 0.0;
        }
        clamp_unit((libm::log(nat.max(LOG_FLOOR)) - self.log_min) / self.log_range)
    }
}

/// Piecewise mapping, linear in the log domain between breakpoints.
///
/// Useful when a single log law wastes travel, e.g. a delay time with a fine
/// region under 100 ms and a coarse one above.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLogCurve {
    // (normalized position, ln(natural value))
    points: Vec<(f64, f64)>,
}

impl PiecewiseLogCurve {
    /// Builds the curve from `(normalized, natural)` breakpoints.
    ///
    /// The first point must sit at normalized 0, the last at 1, and both
    /// coordinates must strictly increase. Natural values must be positive.
    pub fn new(points: &[(f64, f64)]) -> Result<Self, CurveError> {
        if points.len() < 2 {
            return Err(CurveError::TooFewPoints(points.len()));
        }
        for (i, pair) in points.windows(2).enumerate() {
            if pair[1].0 <= pair[0].0 || pair[1].1 <= pair[0].1 {
                return Err(CurveError::NotMonotonic(i + 1));
            }
        }
        let first = points[0];
        let last = points[points.len() - 1];
        if first.0 != 0.0 || last.0 != 1.0 {
            return Err(CurveError::IncompleteRange);
        }
        if first.1 <= 0.0 {
            return Err(CurveError::NotMonotonic(0));
        }
        Ok(Self {
            points: points
                .iter()
                .map(|&(nrm, nat)| (nrm, libm::log(nat)))
                .collect(),
        })
    }

    fn segment_by_nrm(&self, nrm: f64) -> usize {
        let last_seg = self.points.len() - 2;
        self.points[1..]
            .iter()
            .position(|&(n, _)| nrm <= n)
            .unwrap_or(last_seg)
            .min(last_seg)
    }

    fn segment_by_log(&self, log_nat: f64) -> usize {
        let last_seg = self.points.len() - 2;
        self.points[1..]
            .iter()
            .position(|&(_, l)| log_nat <= l)
            .unwrap_or(last_seg)
            .min(last_seg)
    }
}

impl Curve for PiecewiseLogCurve {
    fn forward(&self, nrm: f64) -> f64 {
        let x = clamp_unit(nrm);
        let seg = self.segment_by_nrm(x);
        let (n0, l0) = self.points[seg];
        let (n1, l1) = self.points[seg + 1];
        let t = (x - n0) / (n1 - n0);
        libm::exp(l0 + t * (l1 - l0))
    }

    fn inverse(&self, nat: f64) -> f64 {
        let log_nat = libm::log(nat.max(LOG_FLOOR));
        let seg = self.segment_by_log(log_nat);
        let (n0, l0) = self.points[seg];
        let (n1, l1) = self.points[seg + 1];
        let t = (log_nat - l0) / (l1 - l0);
        clamp_unit(n0 + t * (n1 - n0))
    }
}

/// Power-law mapping with a skew exponent.
///
/// `exp < 1` gives more resolution at the low end, `exp > 1` at the high end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerCurve {
    min: f64,
    max: f64,
    exp: f64,
}

impl PowerCurve {
    /// Creates a power curve. A non-positive exponent falls back to linear.
    pub fn new(min: f64, max: f64, exp: f64) -> Self {
        let exp = if exp > 0.0 && exp.is_finite() { exp } else { 1.0 };
        Self { min, max, exp }
    }
}

impl Curve for PowerCurve {
    #[inline]
    fn forward(&self, nrm: f64) -> f64 {
        self.min + libm::pow(clamp_unit(nrm), self.exp) * (self.max - self.min)
    }

    #[inline]
    fn inverse(&self, nat: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            return 0.0;
        }
        let lin = clamp_unit((nat - self.min) / range);
        libm::pow(lin, 1.0 / self.exp)
    }
}

/// Enumerated parameter: `count` discrete choices indexed from 0.
///
/// `forward` rounds to the nearest index, so round trips are exact only on
/// the grid `k / (count - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumCurve {
    count: u32,
}

impl EnumCurve {
    /// Creates an enumeration over `count` values (at least one).
    pub const fn new(count: u32) -> Self {
        Self {
            count: if count == 0 { 1 } else { count },
        }
    }

    /// Number of choices.
    pub const fn count(&self) -> u32 {
        self.count
    }
}

impl Curve for EnumCurve {
    #[inline]
    fn forward(&self, nrm: f64) -> f64 {
        let last = f64::from(self.count - 1);
        libm::round(clamp_unit(nrm) * last)
    }

    #[inline]
    fn inverse(&self, nat: f64) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }
        let last = f64::from(self.count - 1);
        libm::round(nat.clamp(0.0, last)) / last
    }
}

/// Custom monotonic mapping given as a pair of functions.
///
/// The caller guarantees `inverse(forward(x)) == x` on `[0, 1]`.
#[derive(Clone, Copy)]
pub struct FnCurve {
    forward: fn(f64) -> f64,
    inverse: fn(f64) -> f64,
}

impl FnCurve {
    /// Wraps a forward/inverse pair.
    pub const fn new(forward: fn(f64) -> f64, inverse: fn(f64) -> f64) -> Self {
        Self { forward, inverse }
    }
}

impl fmt::Debug for FnCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCurve").finish_non_exhaustive()
    }
}

impl Curve for FnCurve {
    #[inline]
    fn forward(&self, nrm: f64) -> f64 {
        (self.forward)(clamp_unit(nrm))
    }

    #[inline]
    fn inverse(&self, nat: f64) -> f64 {
        clamp_unit((self.inverse)(nat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip(curve: &dyn Curve, x: f64) {
        let back = curve.inverse(curve.forward(x));
        assert!(
            (back - x).abs() <= 1e-5 * x.abs().max(1e-6),
            "{curve:?}: x={x} came back as {back}"
        );
    }

    #[test]
    fn linear_endpoints_and_midpoint() {
        let c = LinearCurve::new(0.0, 100.0);
        assert_eq!(c.forward(0.0), 0.0);
        assert_eq!(c.forward(0.5), 50.0);
        assert_eq!(c.forward(1.0), 100.0);
        assert_eq!(c.inverse(25.0), 0.25);
    }

    #[test]
    fn linear_clamps_out_of_range() {
        let c = LinearCurve::new(-60.0, 12.0);
        assert_eq!(c.forward(2.0), 12.0);
        assert_eq!(c.forward(-1.0), -60.0);
        assert_eq!(c.inverse(100.0), 1.0);
        assert_eq!(c.inverse(f64::NAN), 0.0);
    }

    #[test]
    fn linear_zero_range() {
        let c = LinearCurve::new(42.0, 42.0);
        assert_eq!(c.inverse(42.0), 0.0);
    }

    #[test]
    fn log_midpoint_is_geometric_mean() {
        let c = LogCurve::new(20.0, 20000.0);
        let mid = c.forward(0.5);
        assert!((mid - (20.0f64 * 20000.0).sqrt()).abs() < 1e-9);
        assert!((c.nat_min() - 20.0).abs() < 1e-9);
        assert!((c.nat_max() - 20000.0).abs() < 1e-6);
    }

    #[test]
    fn log_non_positive_bounds_are_floored() {
        let c = LogCurve::new(0.0, 1.0);
        assert!(c.forward(0.0) > 0.0);
        assert!(c.inverse(-5.0) == 0.0);
    }

    #[test]
    fn piecewise_hits_breakpoints() {
        let c = PiecewiseLogCurve::new(&[(0.0, 1.0), (0.5, 100.0), (1.0, 2000.0)]).unwrap();
        assert!((c.forward(0.0) - 1.0).abs() < 1e-9);
        assert!((c.forward(0.5) - 100.0).abs() < 1e-9);
        assert!((c.forward(1.0) - 2000.0).abs() < 1e-6);
        assert!((c.forward(0.25) - 10.0).abs() < 1e-9);
        assert!((c.inverse(10.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn piecewise_rejects_bad_points() {
        assert_eq!(
            PiecewiseLogCurve::new(&[(0.0, 1.0)]),
            Err(CurveError::TooFewPoints(1))
        );
        assert_eq!(
            PiecewiseLogCurve::new(&[(0.0, 1.0), (0.5, 1.0), (1.0, 5.0)]),
            Err(CurveError::NotMonotonic(1))
        );
        assert_eq!(
            PiecewiseLogCurve::new(&[(0.1, 1.0), (1.0, 5.0)]),
            Err(CurveError::IncompleteRange)
        );
        assert_eq!(
            PiecewiseLogCurve::new(&[(0.0, 0.0), (1.0, 5.0)]),
            Err(CurveError::NotMonotonic(0))
        );
    }

    #[test]
    fn power_skew() {
        let c = PowerCurve::new(0.0, 100.0, 2.0);
        assert!((c.forward(0.5) - 25.0).abs() < 1e-12);
        assert!((c.inverse(25.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn power_invalid_exponent_is_linear() {
        let c = PowerCurve::new(0.0, 10.0, -3.0);
        assert!((c.forward(0.3) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn enum_rounds_to_index() {
        let c = EnumCurve::new(5);
        assert_eq!(c.forward(0.0), 0.0);
        assert_eq!(c.forward(0.26), 1.0);
        assert_eq!(c.forward(1.0), 4.0);
        assert_eq!(c.inverse(2.0), 0.5);
        assert_eq!(c.inverse(9.0), 1.0);
    }

    #[test]
    fn enum_single_choice() {
        let c = EnumCurve::new(0);
        assert_eq!(c.count(), 1);
        assert_eq!(c.forward(0.7), 0.0);
        assert_eq!(c.inverse(0.0), 0.0);
    }

    #[test]
    fn fn_curve_uses_supplied_pair() {
        let c = FnCurve::new(|x| x * x * 8.0, |y| (y / 8.0).sqrt());
        assert!((c.forward(0.5) - 2.0).abs() < 1e-12);
        assert_round_trip(&c, 0.3);
    }

    #[test]
    fn round_trips_on_a_grid() {
        let curves: Vec<Box<dyn Curve>> = vec![
            Box::new(LinearCurve::new(-60.0, 12.0)),
            Box::new(LogCurve::new(20.0, 20000.0)),
            Box::new(PiecewiseLogCurve::new(&[(0.0, 1.0), (0.3, 50.0), (1.0, 5000.0)]).unwrap()),
            Box::new(PowerCurve::new(0.0, 1.0, 3.0)),
        ];
        for curve in &curves {
            for i in 0..=100 {
                assert_round_trip(curve.as_ref(), f64::from(i) / 100.0);
            }
        }
    }
}
