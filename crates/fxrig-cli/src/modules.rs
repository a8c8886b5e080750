//! Modules the command-line host can put in a chain.
//!
//! | Kind | Parameters |
//! |------|------------|
//! | `gain` | `level` (-60..12 dB) |
//! | `pan` | `position` (-1 left .. 1 right, bipolar) |

use anyhow::{Context, bail};
use fxrig_config::{ModuleCatalog, ModuleConfig};
use fxrig_core::{
    ModuleError, ModuleState, ParamDesc, ParamKey, ParamStateSet, ParamStateSetBuilder,
    ParamUnit, ProcInfo, Processable,
};

/// Module kinds, in listing order.
pub const KINDS: &[&str] = &["gain", "pan"];

/// Resolves kinds to their parameter names for configuration validation.
pub struct Catalog;

impl ModuleCatalog for Catalog {
    fn param_names(&self, kind: &str) -> Option<&[&str]> {
        match kind {
            "gain" => Some(&["level"]),
            "pan" => Some(&["position"]),
            _ => None,
        }
    }
}

/// Creates a module with default parameters.
pub fn create(kind: &str) -> Option<Box<dyn Processable>> {
    match kind {
        "gain" => Some(Box::new(Gain::new())),
        "pan" => Some(Box::new(Pan::new())),
        _ => None,
    }
}

/// Creates the module a chain entry describes: ramp time from the engine
/// section, initial values from the entry (natural units, no ramp).
pub fn build(config: &ModuleConfig, ramp_time: f32) -> anyhow::Result<Box<dyn Processable>> {
    let Some(mut module) = create(&config.kind) else {
        bail!("unknown module kind '{}'", config.kind);
    };
    let params = module.param_set_mut();
    let keys: Vec<ParamKey> = params.keys().collect();
    for &key in &keys {
        params.set_ramp_time(key, ramp_time)?;
    }
    for (name, &nat) in &config.params {
        let Some(key) = keys
            .iter()
            .copied()
            .find(|&k| params.desc(k).name.eq_ignore_ascii_case(name))
        else {
            bail!("module '{}' has no parameter '{}'", config.kind, name);
        };
        let nrm = params.desc(key).nat_to_nrm(nat);
        params
            .set_val(key, nrm)
            .with_context(|| format!("setting '{name}' on '{}'", config.kind))?;
    }
    Ok(module)
}

fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Level control on every channel.
pub struct Gain {
    params: ParamStateSet,
    state: ModuleState,
    level: ParamKey,
}

impl Gain {
    /// Unity gain.
    pub fn new() -> Self {
        let mut b = ParamStateSetBuilder::new();
        let level = b.add(
            ParamDesc::linear("level", -60.0, 12.0, ParamUnit::Decibels)
                .with_short_name("Level")
                .with_default_nat(0.0),
        );
        Self {
            params: b.build(),
            state: ModuleState::Created,
            level,
        }
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new()
    }
}

impl Processable for Gain {
    fn reset(&mut self, sample_rate: f64, _max_block_size: usize) -> Result<usize, ModuleError> {
        self.params.set_sample_rate(sample_rate);
        self.state = ModuleState::Active;
        Ok(0)
    }

    fn process_block(&mut self, info: &mut ProcInfo<'_>) -> usize {
        let nbr_chn = info.inputs.nbr_chn().min(info.outputs.nbr_chn());
        for chn in 0..nbr_chn {
            let src = info.inputs.channel(chn);
            let dst = info.outputs.channel_mut(chn);
            for (pos, (d, &s)) in dst.iter_mut().zip(src).enumerate() {
                *d = s * db_to_gain(self.params.get_ramp_val(self.level, pos));
            }
        }
        nbr_chn
    }

    fn state(&self) -> ModuleState {
        self.state
    }

    fn clean_quick(&mut self) {}

    fn param_set(&self) -> &ParamStateSet {
        &self.params
    }

    fn param_set_mut(&mut self) -> &mut ParamStateSet {
        &mut self.params
    }
}

/// Stereo balance. Mono input is spread over both outputs.
pub struct Pan {
    params: ParamStateSet,
    state: ModuleState,
    position: ParamKey,
}

impl Pan {
    /// Centered.
    pub fn new() -> Self {
        let mut b = ParamStateSetBuilder::new();
        let position = b.add(
            ParamDesc::linear("position", -1.0, 1.0, ParamUnit::None)
                .with_short_name("Pan")
                .with_default(0.5)
                .bipolar(),
        );
        Self {
            params: b.build(),
            state: ModuleState::Created,
            position,
        }
    }
}

impl Default for Pan {
    fn default() -> Self {
        Self::new()
    }
}

impl Processable for Pan {
    fn reset(&mut self, sample_rate: f64, _max_block_size: usize) -> Result<usize, ModuleError> {
        self.params.set_sample_rate(sample_rate);
        self.state = ModuleState::Active;
        Ok(0)
    }

    fn process_block(&mut self, info: &mut ProcInfo<'_>) -> usize {
        let nbr_in = info.inputs.nbr_chn();
        if nbr_in == 0 || info.outputs.nbr_chn() < 2 {
            return 0;
        }
        let left = info.inputs.channel(0);
        let right = info.inputs.channel(nbr_in.min(2) - 1);
        for pos in 0..info.nbr_spl.min(left.len()) {
            let p = self.params.get_ramp_val(self.position, pos);
            info.outputs.channel_mut(0)[pos] = left[pos] * (1.0 - p).min(1.0);
            info.outputs.channel_mut(1)[pos] = right[pos] * (1.0 + p).min(1.0);
        }
        2
    }

    fn state(&self) -> ModuleState {
        self.state
    }

    fn clean_quick(&mut self) {}

    fn param_set(&self) -> &ParamStateSet {
        &self.params
    }

    fn param_set_mut(&mut self) -> &mut ParamStateSet {
        &mut self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxrig_core::{BufferSet, BufferSetMut};

    fn render(module: &mut dyn Processable, input: &[f32], n: usize) -> Vec<f32> {
        module.reset(48000.0, n).unwrap();
        module.update_params(n);
        let mut out = vec![0.0; input.len()];
        let mut info = ProcInfo {
            inputs: BufferSet::new(input, n, n),
            outputs: BufferSetMut::new(&mut out, n, n),
            nbr_spl: n,
            events: &[],
        };
        module.process_block(&mut info);
        out
    }

    #[test]
    fn catalog_matches_modules() {
        for kind in KINDS {
            let module = create(kind).unwrap();
            let names = Catalog.param_names(kind).unwrap();
            let params = module.param_set();
            assert_eq!(params.len(), names.len());
            for (key, name) in params.keys().zip(names) {
                assert_eq!(params.desc(key).name, *name);
            }
        }
        assert!(create("flanger").is_none());
        assert!(Catalog.param_names("flanger").is_none());
    }

    #[test]
    fn gain_applies_initial_level() {
        let config = ModuleConfig::new("gain").with_param("Level", -6.0);
        let mut gain = build(&config, 0.0).unwrap();
        let out = render(gain.as_mut(), &[1.0; 8], 4);
        assert!(out.iter().all(|&s| (s - 0.501_187).abs() < 1e-4), "{out:?}");
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let config = ModuleConfig::new("pan").with_param("width", 1.0);
        assert!(build(&config, 0.0).is_err());
        assert!(build(&ModuleConfig::new("chorus"), 0.0).is_err());
    }

    #[test]
    fn pan_hard_left() {
        let config = ModuleConfig::new("pan").with_param("position", -1.0);
        let mut pan = build(&config, 0.0).unwrap();
        let out = render(pan.as_mut(), &[0.5; 8], 4);
        assert_eq!(&out[..4], &[0.5; 4]);
        assert_eq!(&out[4..], &[0.0; 4]);
    }

    #[test]
    fn centered_pan_is_transparent() {
        let mut pan = Pan::new();
        let input: Vec<f32> = (0..8).map(|i| i as f32).collect();
        assert_eq!(render(&mut pan, &input, 4), input);
    }
}
