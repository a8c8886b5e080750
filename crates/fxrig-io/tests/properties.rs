//! Property-based tests for device word conversion.

use fxrig_io::{float_to_native, native_to_float};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Words already on the resolution grid survive a round trip unchanged.
    #[test]
    fn grid_words_round_trip(k in -(1i32 << 23)..(1i32 << 23), bits in 8u32..=24) {
        let shift = 32 - bits;
        let word = (k >> (24 - bits)) << shift;
        prop_assert_eq!(float_to_native(native_to_float(word), bits), word);
    }

    /// Any word lands within one step of where it started.
    #[test]
    fn any_word_rounds_to_nearest(word in any::<i32>(), bits in 8u32..=24) {
        let back = float_to_native(native_to_float(word), bits);
        let step = 1i64 << (32 - bits);
        prop_assert!((i64::from(back) - i64::from(word)).abs() <= step);
    }

    /// Out of range samples saturate instead of wrapping.
    #[test]
    fn saturation(x in 1.0f32..1e6, bits in 8u32..=32) {
        prop_assert!(float_to_native(x, bits) > 0);
        prop_assert_eq!(float_to_native(-x, bits), i32::MIN);
    }

    /// The conversion never reverses the sign of a sample.
    #[test]
    fn sign_is_preserved(x in -1.0f32..1.0, bits in 8u32..=32) {
        let w = float_to_native(x, bits);
        prop_assert!(w == 0 || (w > 0) == (x > 0.0));
    }
}
