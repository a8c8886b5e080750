//! Response curves applied to control values.
//!
//! Curves are defined on `[0, 1]` and extended to `[-1, 0]` as odd
//! functions, so a bipolar control keeps the same feel on both sides of its
//! center.

use serde::{Deserialize, Serialize};

/// Shape of a control response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCurve {
    /// `y = x`
    #[default]
    Linear,
    /// `y = x²`: fine resolution at the start of travel.
    Slow,
    /// `y = 1 - (1 - x)²`: coarse start, fine end.
    Fast,
    /// Smoothstep `y = 3x² - 2x³`.
    S1,
    /// Inverse of [`S1`](Self::S1).
    S1Inv,
}

impl ControlCurve {
    /// Every curve.
    pub const ALL: [ControlCurve; 5] = [
        ControlCurve::Linear,
        ControlCurve::Slow,
        ControlCurve::Fast,
        ControlCurve::S1,
        ControlCurve::S1Inv,
    ];

    fn shape(self, x: f64) -> f64 {
        match self {
            ControlCurve::Linear => x,
            ControlCurve::Slow => x * x,
            ControlCurve::Fast => {
                let r = 1.0 - x;
                1.0 - r * r
            }
            ControlCurve::S1 => x * x * (3.0 - 2.0 * x),
            ControlCurve::S1Inv => invert_s1(x),
        }
    }

    fn shape_inverse(self, y: f64) -> f64 {
        match self {
            ControlCurve::Linear => y,
            ControlCurve::Slow => libm::sqrt(y),
            ControlCurve::Fast => 1.0 - libm::sqrt(1.0 - y),
            ControlCurve::S1 => invert_s1(y),
            ControlCurve::S1Inv => y * y * (3.0 - 2.0 * y),
        }
    }
}

fn invert_s1(y: f64) -> f64 {
    0.5 - libm::sin(libm::asin(1.0 - 2.0 * y) / 3.0)
}

/// Shapes `val` (in `[-1, 1]`) with `curve`.
///
/// With `invert_flag`, the curve is mirrored around its midpoint
/// (`1 - f(1 - x)`), which keeps the response feel when the controller
/// drives the parameter downwards.
pub fn apply_curve(val: f32, curve: ControlCurve, invert_flag: bool) -> f32 {
    if curve == ControlCurve::Linear {
        return val;
    }
    let x = f64::from(val.abs()).min(1.0);
    let y = if invert_flag {
        1.0 - curve.shape(1.0 - x)
    } else {
        curve.shape(x)
    };
    (y as f32).copysign(val)
}

/// Undoes [`apply_curve`] with the same `curve` and `invert_flag`.
pub fn invert_curve(val: f32, curve: ControlCurve, invert_flag: bool) -> f32 {
    if curve == ControlCurve::Linear {
        return val;
    }
    let y = f64::from(val.abs()).min(1.0);
    let x = if invert_flag {
        1.0 - curve.shape_inverse(1.0 - y)
    } else {
        curve.shape_inverse(y)
    };
    (x as f32).copysign(val)
}
