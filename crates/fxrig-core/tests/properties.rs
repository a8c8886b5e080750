//! Property-based tests for fxrig-core.
//!
//! Checks ramp exactness and monotonicity for arbitrary block splits,
//! curve round trips, and flag propagation over random observer graphs.

use fxrig_core::{
    Curve, LinearCurve, LogCurve, NotificationFlagsBuilder, ParamDomain, ParamState,
    PiecewiseLogCurve, PowerCurve,
};
use proptest::prelude::*;

fn ramp_len(ramp_time: f32, sample_rate: f64) -> usize {
    ((f64::from(ramp_time) * sample_rate).ceil() as usize).max(1)
}

fn assert_round_trip(curve: &dyn Curve, x: f64) -> Result<(), TestCaseError> {
    let back = curve.inverse(curve.forward(x));
    let tol = 1e-5 * x.abs().max(1e-6);
    prop_assert!(
        (back - x).abs() <= tol,
        "round trip of {} gave {} ({:?})",
        x,
        back,
        curve
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// For any start, target, ramp time and block split, the value equals
    /// the target exactly once ceil(d * sr) samples have been processed, and
    /// never overshoots it on the way.
    #[test]
    fn ramp_lands_exactly_without_overshoot(
        start in 0.0f32..=1.0f32,
        target in 0.0f32..=1.0f32,
        ramp_ms in 0.1f32..50.0f32,
        sample_rate in prop::sample::select(vec![44100.0f64, 48000.0, 96000.0]),
        blocks in prop::collection::vec(1usize..300, 1..64),
    ) {
        let ramp_time = ramp_ms / 1000.0;
        let mut p = ParamState::new(start, ParamDomain::Unipolar, ramp_time);
        p.set_sample_rate(sample_rate);
        p.set_target(target);

        let total = ramp_len(ramp_time, sample_rate);
        let (lo, hi) = if start <= target { (start, target) } else { (target, start) };
        let mut done = 0;
        for &n in blocks.iter().cycle() {
            p.process_block(n);
            done += n;
            prop_assert!(p.val_end() >= lo && p.val_end() <= hi);
            if done >= total {
                break;
            }
        }
        prop_assert_eq!(p.val_end(), target);
        prop_assert!(!p.is_ramping());
    }

    /// Per-sample ramp values stay between the block's begin and end values.
    #[test]
    fn ramp_values_inside_block_are_bounded(
        target in -1.0f32..=1.0f32,
        block in 1usize..512,
    ) {
        let mut p = ParamState::new(0.0, ParamDomain::Bipolar, 0.005);
        p.set_sample_rate(48000.0);
        p.set_target(target);
        p.process_block(block);
        let (lo, hi) = if p.val_beg() <= p.val_end() {
            (p.val_beg(), p.val_end())
        } else {
            (p.val_end(), p.val_beg())
        };
        for pos in 0..block {
            let v = p.get_ramp_val(pos);
            prop_assert!(v >= lo - 1e-6 && v <= hi + 1e-6);
        }
    }

    /// Log curves round-trip within 1e-5 relative tolerance.
    #[test]
    fn log_curve_round_trip(
        min in 0.001f64..100.0,
        ratio in 2.0f64..10000.0,
        x in 0.0f64..=1.0,
    ) {
        let curve = LogCurve::new(min, min * ratio);
        assert_round_trip(&curve, x)?;
    }

    /// Linear and power curves round-trip within 1e-5 relative tolerance.
    #[test]
    fn linear_and_power_round_trip(
        min in -1000.0f64..0.0,
        span in 1.0f64..2000.0,
        exp in 0.25f64..4.0,
        x in 0.05f64..=1.0,
    ) {
        assert_round_trip(&LinearCurve::new(min, min + span), x)?;
        assert_round_trip(&PowerCurve::new(min, min + span, exp), x)?;
    }

    /// Piecewise log curves round-trip on every segment.
    #[test]
    fn piecewise_round_trip(x in 0.0f64..=1.0) {
        let curve = PiecewiseLogCurve::new(&[
            (0.0, 1.0),
            (0.25, 10.0),
            (0.75, 500.0),
            (1.0, 2000.0),
        ])
        .unwrap();
        assert_round_trip(&curve, x)?;
    }

    /// Curves are monotonic non-decreasing.
    #[test]
    fn curves_are_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let log = LogCurve::new(20.0, 20000.0);
        prop_assert!(log.forward(lo) <= log.forward(hi));
        let pow = PowerCurve::new(0.0, 10.0, 3.0);
        prop_assert!(pow.forward(lo) <= pow.forward(hi));
    }

    /// Setting a flag sets exactly the flags reachable from it in a random
    /// forward-only graph.
    #[test]
    fn flag_propagation_matches_reachability(
        edges in prop::collection::vec((0usize..8, 0usize..8), 0..20),
        start in 0usize..8,
    ) {
        let mut b = NotificationFlagsBuilder::new();
        let ids: Vec<_> = (0..8).map(|_| b.add_flag()).collect();
        let mut adj = vec![Vec::new(); 8];
        for &(from, to) in &edges {
            // Only forward edges, so no cycle can form
            if from < to && b.add_observer(ids[from], ids[to]).is_ok() {
                adj[from].push(to);
            }
        }
        let mut flags = b.build();
        flags.set(ids[start]);

        let mut reach = vec![false; 8];
        let mut stack = vec![start];
        while let Some(n) = stack.pop() {
            if !reach[n] {
                reach[n] = true;
                stack.extend_from_slice(&adj[n]);
            }
        }
        for i in 0..8 {
            prop_assert_eq!(flags.get(ids[i]), reach[i]);
        }
    }
}
