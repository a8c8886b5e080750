//! Conversion between device words and internal float samples.
//!
//! Devices exchange interleaved 32-bit words whose top `resolution_bits`
//! carry the sample (24-in-32 for most converters). Inside the engine,
//! samples are planar `f32` in `[-1, 1)`.
//!
//! ```rust
//! use fxrig_io::sample_format::{float_to_native, native_to_float};
//!
//! let word = float_to_native(0.5, 24);
//! assert_eq!(word, 0x4000_0000);
//! assert_eq!(native_to_float(word), 0.5);
//!
//! // Out of range values saturate.
//! assert_eq!(float_to_native(2.0, 24), 0x7FFF_FF00);
//! ```

/// Effective bits of a 24-in-32 device word.
pub const DEFAULT_RESOLUTION_BITS: u32 = 24;

/// Accepted range for the effective resolution.
pub const RESOLUTION_RANGE: std::ops::RangeInclusive<u32> = 8..=32;

const NATIVE_SCALE: f64 = 2147483648.0; // 2^31

/// Converts one device word to a float sample.
#[inline]
pub fn native_to_float(word: i32) -> f32 {
    (f64::from(word) / NATIVE_SCALE) as f32
}

/// Converts one float sample to a device word with `bits` effective bits.
///
/// The sample is rounded to the nearest step, saturated, and the bits below
/// the resolution are zero. NaN maps to silence.
#[inline]
pub fn float_to_native(sample: f32, bits: u32) -> i32 {
    let bits = bits.clamp(*RESOLUTION_RANGE.start(), *RESOLUTION_RANGE.end());
    if sample.is_nan() {
        return 0;
    }
    let scale = (1_i64 << (bits - 1)) as f64;
    let q = (f64::from(sample) * scale).round().clamp(-scale, scale - 1.0) as i64;
    (q << (32 - bits)) as i32
}

/// Copies channel `chn` of an interleaved block into `dst`, converting.
///
/// Frames are read from `first_frame` on; missing frames read as silence.
pub fn read_channel(src: &[i32], nbr_chn: usize, chn: usize, first_frame: usize, dst: &mut [f32]) {
    for (i, d) in dst.iter_mut().enumerate() {
        let pos = (first_frame + i) * nbr_chn + chn;
        *d = src.get(pos).map_or(0.0, |&w| native_to_float(w));
    }
}

/// Writes `src` into channel `chn` of an interleaved block, converting.
///
/// Frames land from `first_frame` on; frames past the end of `dst` are
/// dropped.
pub fn write_channel(
    src: &[f32],
    bits: u32,
    dst: &mut [i32],
    nbr_chn: usize,
    chn: usize,
    first_frame: usize,
) {
    for (i, &s) in src.iter().enumerate() {
        let pos = (first_frame + i) * nbr_chn + chn;
        match dst.get_mut(pos) {
            Some(d) => *d = float_to_native(s, bits),
            None => break,
        }
    }
}
