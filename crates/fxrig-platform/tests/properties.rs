//! Property-based tests for control mapping invariants.

use fxrig_core::ParamDomain;
use fxrig_platform::{ControlCurve, ControlSource, ControlledParam, CtrlUnit, apply_curve};
use proptest::prelude::*;

fn curve() -> impl Strategy<Value = ControlCurve> {
    prop::sample::select(ControlCurve::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Shaped values never leave `[-1, 1]` and keep the sign of the input.
    #[test]
    fn curve_output_is_bounded(x in -1.0f32..=1.0, c in curve(), invert in any::<bool>()) {
        let y = apply_curve(x, c, invert);
        prop_assert!((-1.0..=1.0).contains(&y));
        prop_assert!(y == 0.0 || x == 0.0 || y.signum() == x.signum());
    }

    /// Curves never reverse the direction of travel.
    #[test]
    fn curve_is_monotonic(a in 0.0f32..=1.0, b in 0.0f32..=1.0, c in curve()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(apply_curve(lo, c, false) <= apply_curve(hi, c, false) + 1e-6);
    }

    /// Encoder position stays in `[0, 1]` whatever the step sequence.
    #[test]
    fn encoder_accumulator_is_bounded(
        step in 0.001f32..0.5,
        ticks in prop::collection::vec(-20.0f32..20.0, 1..64),
    ) {
        let mut unit = CtrlUnit::new(ControlSource::rotenc(0), true);
        unit.set_step(step).unwrap();
        for t in ticks {
            unit.update_abs_val(t);
            prop_assert!((0.0..=1.0).contains(&unit.val()));
        }
    }

    /// The combined value always lies in the parameter domain.
    #[test]
    fn combined_value_stays_in_domain(
        base in -2.0f32..2.0,
        amps in prop::collection::vec(-2.0f32..2.0, 0..6),
        raw in -1.0f32..=1.0,
        bipolar in any::<bool>(),
    ) {
        let domain = if bipolar { ParamDomain::Bipolar } else { ParamDomain::Unipolar };
        let mut param = ControlledParam::new();
        for (i, amp) in amps.into_iter().enumerate() {
            let mut unit = CtrlUnit::new(ControlSource::gui(i as u16), false);
            unit.amp = amp;
            unit.update_abs_val(raw);
            param.add(unit).unwrap();
        }
        let v = param.compute(base, domain);
        prop_assert!(v >= domain.min() && v <= domain.max());
    }
}
