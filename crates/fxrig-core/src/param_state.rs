//! Block-based linear ramps for parameter automation.
//!
//! A [`ParamState`] holds a normalized value that moves linearly towards a
//! target over a fixed ramp time. The value only moves when the owner calls
//! [`ParamState::process_block`], so a target posted at any time lands on the
//! next block boundary and every module sees the same value for the whole
//! block.
//!
//! Within a block, the value at each sample is available through
//! [`ParamState::get_ramp_val`] for modules that need per-sample accuracy.
//!
//! ```rust
//! use fxrig_core::{ParamDomain, ParamState};
//!
//! let mut gain = ParamState::new(0.0, ParamDomain::Unipolar, 0.010);
//! gain.set_sample_rate(48000.0);
//! gain.set_target(1.0);
//!
//! // 10 ms at 48 kHz is 480 samples
//! gain.process_block(256);
//! assert!(gain.val_end() < 1.0);
//! gain.process_block(256);
//! assert_eq!(gain.val_end(), 1.0);
//! ```

use crate::param_desc::ParamDomain;

/// Ramp state of one parameter, in the normalized domain.
#[derive(Debug, Clone)]
pub struct ParamState {
    /// Value at the start of the last processed block
    val_beg: f32,
    /// Value at the end of the last processed block
    val_end: f32,
    /// Value the ramp is heading to
    val_tgt: f32,
    /// Increment per sample used during the last block
    step: f32,
    /// Number of ramping samples in the last block; later samples hold `val_end`
    ramp_len: u32,
    /// Samples left before the target is reached
    remaining: u32,
    /// Ramp time in seconds
    ramp_time: f32,
    sample_rate: f64,
    domain: ParamDomain,
}

impl ParamState {
    /// Creates a settled state at `initial` (clamped to `domain`).
    pub fn new(initial: f32, domain: ParamDomain, ramp_time: f32) -> Self {
        let initial = domain.clamp(initial);
        Self {
            val_beg: initial,
            val_end: initial,
            val_tgt: initial,
            step: 0.0,
            ramp_len: 0,
            remaining: 0,
            ramp_time: ramp_time.max(0.0),
            sample_rate: 48000.0,
            domain,
        }
    }

    /// Sets the sample rate used to size ramps started from now on.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if sample_rate > 0.0 {
            self.sample_rate = sample_rate;
        }
    }

    /// Sets the ramp time in seconds. Applies to the next target.
    pub fn set_ramp_time(&mut self, seconds: f32) {
        self.ramp_time = seconds.max(0.0);
    }

    /// Ramp time in seconds.
    #[inline]
    pub fn ramp_time(&self) -> f32 {
        self.ramp_time
    }

    /// Starts a ramp towards `nrm` (clamped to the domain).
    ///
    /// The live value does not move until the next
    /// [`process_block`](Self::process_block). Retargeting during a ramp
    /// restarts the ramp duration from the current value.
    pub fn set_target(&mut self, nrm: f32) {
        let tgt = self.domain.clamp(nrm);
        self.val_tgt = tgt;
        if tgt == self.val_end || self.ramp_time == 0.0 {
            self.remaining = 0;
        } else {
            let len = (f64::from(self.ramp_time) * self.sample_rate).ceil();
            self.remaining = (len as u32).max(1);
        }
    }

    /// Jumps to `nrm` immediately, cancelling any ramp.
    pub fn set_val(&mut self, nrm: f32) {
        let val = self.domain.clamp(nrm);
        self.val_beg = val;
        self.val_end = val;
        self.val_tgt = val;
        self.step = 0.0;
        self.ramp_len = 0;
        self.remaining = 0;
    }

    /// Advances the ramp by one block of `nbr_spl` samples.
    ///
    /// Returns `true` if the end value changed.
    pub fn process_block(&mut self, nbr_spl: usize) -> bool {
        self.val_beg = self.val_end;
        self.step = 0.0;
        self.ramp_len = 0;

        if self.remaining == 0 {
            self.val_end = self.val_tgt;
        } else if nbr_spl > 0 {
            let len = u32::try_from(nbr_spl).unwrap_or(u32::MAX).min(self.remaining);
            self.step = (self.val_tgt - self.val_end) / self.remaining as f32;
            self.remaining -= len;
            self.ramp_len = len;
            if self.remaining == 0 {
                self.val_end = self.val_tgt;
            } else {
                let end = self.val_end + self.step * len as f32;
                // Never cross the target because of rounding
                self.val_end = if self.step > 0.0 {
                    end.min(self.val_tgt)
                } else {
                    end.max(self.val_tgt)
                };
            }
        }

        self.val_end != self.val_beg
    }

    /// Value at sample `pos` of the last processed block.
    ///
    /// Samples past the ramp (or after a jump) hold the end value.
    #[inline]
    pub fn get_ramp_val(&self, pos: usize) -> f32 {
        if pos < self.ramp_len as usize {
            self.val_beg + self.step * pos as f32
        } else {
            self.val_end
        }
    }

    /// Value at the start of the last processed block.
    #[inline]
    pub fn val_beg(&self) -> f32 {
        self.val_beg
    }

    /// Value at the end of the last processed block.
    #[inline]
    pub fn val_end(&self) -> f32 {
        self.val_end
    }

    /// Current target.
    #[inline]
    pub fn val_tgt(&self) -> f32 {
        self.val_tgt
    }

    /// Returns `true` while the end value has not reached the target.
    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.val_end != self.val_tgt
    }

    /// Normalized domain of the value.
    #[inline]
    pub fn domain(&self) -> ParamDomain {
        self.domain
    }
}

impl Default for ParamState {
    fn default() -> Self {
        Self::new(0.0, ParamDomain::Unipolar, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_10ms() -> ParamState {
        let mut p = ParamState::new(0.0, ParamDomain::Unipolar, 0.010);
        p.set_sample_rate(48000.0);
        p
    }

    #[test]
    fn target_does_not_move_value_before_block() {
        let mut p = ramp_10ms();
        p.set_target(1.0);
        assert_eq!(p.val_end(), 0.0);
        assert_eq!(p.val_tgt(), 1.0);
    }

    #[test]
    fn ramp_reaches_target_exactly() {
        let mut p = ramp_10ms();
        p.set_target(1.0);

        let mut done = 0;
        while done < 480 {
            let n = 64.min(480 - done);
            p.process_block(n);
            done += n;
            assert!(p.val_end() <= 1.0);
        }
        assert_eq!(p.val_end(), 1.0);
        assert!(!p.is_ramping());
    }

    #[test]
    fn ramp_is_linear() {
        let mut p = ramp_10ms();
        p.set_target(1.0);
        p.process_block(240);
        assert!((p.val_end() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn ramp_finishing_mid_block_clamps() {
        let mut p = ramp_10ms();
        p.set_target(1.0);
        p.process_block(400);
        p.process_block(256);
        assert_eq!(p.val_end(), 1.0);
        assert_eq!(p.get_ramp_val(80), 1.0);
        assert_eq!(p.get_ramp_val(255), 1.0);
        assert!(p.get_ramp_val(79) < 1.0);
    }

    #[test]
    fn zero_ramp_jumps_at_block_boundary() {
        let mut p = ParamState::new(0.2, ParamDomain::Unipolar, 0.0);
        p.set_target(0.8);
        assert_eq!(p.val_end(), 0.2);
        assert!(p.process_block(64));
        assert_eq!(p.val_beg(), 0.2);
        assert_eq!(p.val_end(), 0.8);
        assert_eq!(p.get_ramp_val(0), 0.8);
    }

    #[test]
    fn target_is_clamped_to_domain() {
        let mut p = ParamState::new(0.0, ParamDomain::Bipolar, 0.0);
        p.set_target(-4.0);
        p.process_block(1);
        assert_eq!(p.val_end(), -1.0);
    }

    #[test]
    fn retarget_mid_ramp_restarts_from_current_value() {
        let mut p = ramp_10ms();
        p.set_target(1.0);
        p.process_block(240);
        let mid = p.val_end();
        p.set_target(0.0);
        p.process_block(240);
        assert!(p.val_end() < mid);
        p.process_block(240);
        assert_eq!(p.val_end(), 0.0);
    }

    #[test]
    fn set_val_cancels_ramp() {
        let mut p = ramp_10ms();
        p.set_target(1.0);
        p.process_block(100);
        p.set_val(0.3);
        assert!(!p.is_ramping());
        assert!(!p.process_block(100));
        assert_eq!(p.val_end(), 0.3);
    }

    #[test]
    fn settled_state_reports_no_change() {
        let mut p = ramp_10ms();
        assert!(!p.process_block(128));
        p.set_target(0.0);
        assert!(!p.process_block(128));
    }
}
