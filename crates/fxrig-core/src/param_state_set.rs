//! The parameter automation engine of one module.
//!
//! [`ParamStateSet`] pairs every [`ParamDesc`] of a module with its
//! [`ParamState`] ramp and a dirty flag. The control side only ever produces
//! targets ([`ParamStateSet::set_target`]); the audio thread advances the
//! ramps once per block ([`ParamStateSet::process_block`]) and reads values
//! in either domain.
//!
//! Every parameter owns a flag that is set whenever its value changes, either
//! because a new target was posted or because a ramp moved during the last
//! block. Group flags can observe several parameters so a module can test a
//! single flag before recomputing shared state.
//!
//! ```rust
//! use fxrig_core::{ParamDesc, ParamStateSetBuilder, ParamUnit};
//!
//! let mut builder = ParamStateSetBuilder::new();
//! let freq = builder.add(ParamDesc::log("Cutoff", 20.0, 20000.0, ParamUnit::Hertz));
//! let reso = builder.add(ParamDesc::linear("Resonance", 0.0, 1.0, ParamUnit::None));
//! let coefs = builder.add_group_flag();
//! builder.observe(freq, coefs).unwrap();
//! builder.observe(reso, coefs).unwrap();
//!
//! let mut params = builder.build();
//! params.set_sample_rate(48000.0);
//! assert!(params.take_flag(coefs)); // everything starts dirty
//!
//! params.set_target(reso, 0.5).unwrap();
//! params.process_block(64);
//! assert!(params.take_flag(coefs));
//! ```

use crate::notification::{FlagError, FlagId, NotificationFlags, NotificationFlagsBuilder};
use crate::param_desc::{ParamCateg, ParamDesc, ParamKey};
use crate::param_state::ParamState;

/// Errors raised by parameter set operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// No parameter with this key exists in the set.
    #[error("unknown parameter {0:?}")]
    UnknownParam(ParamKey),

    /// Flag wiring failed.
    #[error(transparent)]
    Flag(#[from] FlagError),
}

#[derive(Debug, Clone)]
struct ParamEntry {
    desc: ParamDesc,
    state: ParamState,
    flag: FlagId,
}

/// Collects the parameters and flag wiring of a module.
#[derive(Debug, Default)]
pub struct ParamStateSetBuilder {
    entries: Vec<(ParamKey, ParamDesc, FlagId)>,
    counts: [usize; ParamCateg::COUNT],
    flags: NotificationFlagsBuilder,
}

impl ParamStateSetBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter. Keys are assigned in order within each category,
    /// starting at 0.
    pub fn add(&mut self, desc: ParamDesc) -> ParamKey {
        let categ = desc.categ;
        let slot = &mut self.counts[categ.as_index()];
        let key = ParamKey {
            categ,
            index: *slot,
        };
        *slot += 1;
        let flag = self.flags.add_flag();
        self.entries.push((key, desc, flag));
        key
    }

    /// Declares a flag that parameters can be attached to with
    /// [`observe`](Self::observe).
    pub fn add_group_flag(&mut self) -> FlagId {
        self.flags.add_flag()
    }

    /// Makes `group` get set whenever the parameter `key` changes.
    pub fn observe(&mut self, key: ParamKey, group: FlagId) -> Result<(), ParamError> {
        let flag = self.flag_of(key).ok_or(ParamError::UnknownParam(key))?;
        self.flags.add_observer(flag, group)?;
        Ok(())
    }

    /// Chains two group flags: `observer` is set whenever `subject` is.
    pub fn chain_flags(&mut self, subject: FlagId, observer: FlagId) -> Result<(), ParamError> {
        self.flags.add_observer(subject, observer)?;
        Ok(())
    }

    /// Flag owned by parameter `key`.
    pub fn flag_of(&self, key: ParamKey) -> Option<FlagId> {
        self.entries
            .iter()
            .find(|(k, _, _)| *k == key)
            .map(|(_, _, flag)| *flag)
    }

    /// Freezes the set. Every flag starts set so the first update computes
    /// all derived state.
    pub fn build(self) -> ParamStateSet {
        let mut lookup: [Vec<usize>; ParamCateg::COUNT] = Default::default();
        let mut entries = Vec::with_capacity(self.entries.len());
        for (pos, (key, desc, flag)) in self.entries.into_iter().enumerate() {
            lookup[key.categ.as_index()].push(pos);
            let state = ParamState::new(desc.default, desc.domain, desc.ramp_time);
            entries.push(ParamEntry { desc, state, flag });
        }
        let mut flags = self.flags.build();
        flags.set_all();
        ParamStateSet {
            entries,
            lookup,
            flags,
            sample_rate: 48000.0,
        }
    }
}

/// Ramp states, descriptors and dirty flags of all parameters of a module.
///
/// Getters panic on keys that were not produced by the builder of this set.
#[derive(Debug, Clone)]
pub struct ParamStateSet {
    entries: Vec<ParamEntry>,
    lookup: [Vec<usize>; ParamCateg::COUNT],
    flags: NotificationFlags,
    sample_rate: f64,
}

impl ParamStateSet {
    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the module has no parameter.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of parameters in a category.
    pub fn count(&self, categ: ParamCateg) -> usize {
        self.lookup[categ.as_index()].len()
    }

    /// Returns `true` if `key` names a parameter of this set.
    pub fn contains(&self, key: ParamKey) -> bool {
        key.index < self.count(key.categ)
    }

    /// All keys, category by category.
    pub fn keys(&self) -> impl Iterator<Item = ParamKey> + '_ {
        ParamCateg::ALL.into_iter().flat_map(move |categ| {
            (0..self.count(categ)).map(move |index| ParamKey { categ, index })
        })
    }

    /// Sample rate the ramps are sized for.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Resizes future ramps for a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        for entry in &mut self.entries {
            entry.state.set_sample_rate(sample_rate);
        }
    }

    /// Descriptor of `key`.
    pub fn desc(&self, key: ParamKey) -> &ParamDesc {
        &self.entry(key).desc
    }

    /// Ramp state of `key`.
    pub fn state(&self, key: ParamKey) -> &ParamState {
        &self.entry(key).state
    }

    /// Flag owned by `key`.
    pub fn flag(&self, key: ParamKey) -> FlagId {
        self.entry(key).flag
    }

    /// Posts a normalized target. Out-of-domain values are clamped.
    pub fn set_target(&mut self, key: ParamKey, nrm: f32) -> Result<(), ParamError> {
        let pos = self.position(key)?;
        let entry = &mut self.entries[pos];
        entry.state.set_target(nrm);
        self.flags.set(entry.flag);
        Ok(())
    }

    /// Posts a target expressed in natural units.
    pub fn set_target_nat(&mut self, key: ParamKey, nat: f32) -> Result<(), ParamError> {
        let pos = self.position(key)?;
        let nrm = self.entries[pos].desc.nat_to_nrm(nat);
        self.set_target(key, nrm)
    }

    /// Sets a normalized value immediately, without ramp.
    pub fn set_val(&mut self, key: ParamKey, nrm: f32) -> Result<(), ParamError> {
        let pos = self.position(key)?;
        let entry = &mut self.entries[pos];
        entry.state.set_val(nrm);
        self.flags.set(entry.flag);
        Ok(())
    }

    /// Changes the ramp time of `key`, in seconds.
    pub fn set_ramp_time(&mut self, key: ParamKey, seconds: f32) -> Result<(), ParamError> {
        let pos = self.position(key)?;
        self.entries[pos].state.set_ramp_time(seconds);
        Ok(())
    }

    /// Puts every parameter back to its default value and sets all flags.
    pub fn reset_to_defaults(&mut self) {
        for entry in &mut self.entries {
            entry.state.set_val(entry.desc.default);
        }
        self.flags.set_all();
    }

    /// Advances every ramp by `nbr_spl` samples and flags the parameters
    /// whose value moved.
    pub fn process_block(&mut self, nbr_spl: usize) {
        for entry in &mut self.entries {
            if entry.state.process_block(nbr_spl) {
                self.flags.set(entry.flag);
            }
        }
    }

    /// Normalized target of `key`.
    #[inline]
    pub fn get_val_tgt(&self, key: ParamKey) -> f32 {
        self.entry(key).state.val_tgt()
    }

    /// Normalized value of `key` at the end of the last block.
    #[inline]
    pub fn get_val_end_nrm(&self, key: ParamKey) -> f32 {
        self.entry(key).state.val_end()
    }

    /// Normalized value of `key` at the start of the last block.
    #[inline]
    pub fn get_val_beg_nrm(&self, key: ParamKey) -> f32 {
        self.entry(key).state.val_beg()
    }

    /// Natural value of `key` at the end of the last block.
    #[inline]
    pub fn get_val_end_nat(&self, key: ParamKey) -> f32 {
        let entry = self.entry(key);
        entry.desc.nrm_to_nat(entry.state.val_end())
    }

    /// Natural value of `key` at the start of the last block.
    #[inline]
    pub fn get_val_beg_nat(&self, key: ParamKey) -> f32 {
        let entry = self.entry(key);
        entry.desc.nrm_to_nat(entry.state.val_beg())
    }

    /// Natural value of `key` at sample `pos` of the last block.
    #[inline]
    pub fn get_ramp_val(&self, key: ParamKey, pos: usize) -> f32 {
        let entry = self.entry(key);
        entry.desc.nrm_to_nat(entry.state.get_ramp_val(pos))
    }

    /// Reads a flag and clears it.
    #[inline]
    pub fn take_flag(&mut self, flag: FlagId) -> bool {
        self.flags.take(flag)
    }

    /// Reads a flag without clearing it.
    #[inline]
    pub fn get_flag(&self, flag: FlagId) -> bool {
        self.flags.get(flag)
    }

    /// Sets every flag.
    pub fn set_all_flags(&mut self) {
        self.flags.set_all();
    }

    fn position(&self, key: ParamKey) -> Result<usize, ParamError> {
        self.lookup[key.categ.as_index()]
            .get(key.index)
            .copied()
            .ok_or(ParamError::UnknownParam(key))
    }

    fn entry(&self, key: ParamKey) -> &ParamEntry {
        &self.entries[self.lookup[key.categ.as_index()][key.index]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_desc::ParamUnit;

    fn two_params() -> (ParamStateSet, ParamKey, ParamKey, FlagId) {
        let mut b = ParamStateSetBuilder::new();
        let gain = b.add(
            ParamDesc::linear("Gain", -60.0, 0.0, ParamUnit::Decibels)
                .with_default_nat(0.0)
                .with_ramp_time(0.010),
        );
        let mode = b.add(ParamDesc::enumerated("Mode", 3));
        let group = b.add_group_flag();
        b.observe(gain, group).unwrap();
        let mut set = b.build();
        set.set_sample_rate(48000.0);
        set.flags.clear_all();
        (set, gain, mode, group)
    }

    #[test]
    fn keys_are_sequential_per_category() {
        let mut b = ParamStateSetBuilder::new();
        let a = b.add(ParamDesc::linear("A", 0.0, 1.0, ParamUnit::None));
        let v = b.add(ParamDesc::linear("V", 0.0, 1.0, ParamUnit::None).voice());
        let c = b.add(ParamDesc::linear("C", 0.0, 1.0, ParamUnit::None));
        assert_eq!(a, ParamKey::global(0));
        assert_eq!(v, ParamKey::voice(0));
        assert_eq!(c, ParamKey::global(1));

        let set = b.build();
        let keys: Vec<_> = set.keys().collect();
        assert_eq!(keys, vec![a, c, v]);
    }

    #[test]
    fn defaults_are_applied() {
        let (set, gain, mode, _) = two_params();
        assert_eq!(set.get_val_end_nat(gain), 0.0);
        assert_eq!(set.get_val_end_nat(mode), 0.0);
    }

    #[test]
    fn set_target_marks_flags() {
        let (mut set, gain, mode, group) = two_params();
        set.set_target(mode, 1.0).unwrap();
        assert!(set.take_flag(set.flag(mode)));
        assert!(!set.get_flag(group));

        set.set_target(gain, 0.0).unwrap();
        assert!(set.get_flag(group));
        assert_eq!(set.get_val_tgt(gain), 0.0);
        assert_eq!(set.get_val_end_nrm(gain), 1.0);
    }

    #[test]
    fn ramping_keeps_flag_set_each_block() {
        let (mut set, gain, _, group) = two_params();
        set.set_target(gain, 0.0).unwrap();
        set.process_block(128);
        assert!(set.take_flag(group));
        set.process_block(128);
        assert!(set.take_flag(group));
        set.process_block(512);
        assert!(set.take_flag(group));
        assert_eq!(set.get_val_end_nat(gain), -60.0);
        set.process_block(128);
        assert!(!set.take_flag(group));
    }

    #[test]
    fn beg_and_end_follow_blocks() {
        let (mut set, gain, _, _) = two_params();
        set.set_target_nat(gain, -60.0).unwrap();
        set.process_block(240);
        assert_eq!(set.get_val_beg_nat(gain), 0.0);
        assert!((set.get_val_end_nat(gain) + 30.0).abs() < 1e-3);
        assert!((set.get_ramp_val(gain, 120) + 15.0).abs() < 1e-3);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let (mut set, _, _, _) = two_params();
        let bad = ParamKey::global(9);
        assert_eq!(set.set_target(bad, 0.5), Err(ParamError::UnknownParam(bad)));
        assert!(!set.contains(bad));
        assert!(!set.contains(ParamKey::voice(0)));
    }

    #[test]
    fn observe_unknown_key_fails() {
        let mut b = ParamStateSetBuilder::new();
        let g = b.add_group_flag();
        assert!(matches!(
            b.observe(ParamKey::global(0), g),
            Err(ParamError::UnknownParam(_))
        ));
    }

    #[test]
    fn reset_restores_defaults() {
        let (mut set, gain, _, _) = two_params();
        set.set_val(gain, 0.0).unwrap();
        set.reset_to_defaults();
        assert_eq!(set.get_val_end_nrm(gain), 1.0);
        assert!(set.get_flag(set.flag(gain)));
    }
}
