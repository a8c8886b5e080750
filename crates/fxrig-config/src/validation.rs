//! Configuration validation.
//!
//! [`validate_config`] checks what a configuration can check on its own:
//! transport settings, link parameters, mapping targets against the chain
//! length, and duplicate absolute controls. Module kinds and parameter
//! indices depend on the modules the host knows about; pass a
//! [`ModuleCatalog`] to [`validate_with_catalog`] to check those too.
//!
//! All problems are collected before returning, so a single run reports
//! everything wrong with a file.
//!
//! # Example
//!
//! ```rust
//! use fxrig_config::{EngineConfig, ModuleCatalog, validate_with_catalog};
//!
//! struct Catalog;
//!
//! impl ModuleCatalog for Catalog {
//!     fn param_names(&self, kind: &str) -> Option<&[&str]> {
//!         match kind {
//!             "gain" => Some(&["level"]),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let config = EngineConfig::from_toml(r#"
//!     [[chain]]
//!     kind = "gain"
//! "#).unwrap();
//! assert!(validate_with_catalog(&config, &Catalog).is_ok());
//! ```

use std::collections::BTreeSet;

use fxrig_io::sample_format::RESOLUTION_RANGE;
use thiserror::Error;

use crate::config::EngineConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Sample rate not positive.
    #[error("sample rate must be positive, got {0}")]
    SampleRate(f64),

    /// Device word resolution outside `8..=32`.
    #[error("resolution_bits must be in 8..=32, got {0}")]
    ResolutionBits(u32),

    /// No output channel selected.
    #[error("at least one output channel is required")]
    NoOutputChannels,

    /// Event queue without room.
    #[error("event_queue_capacity must be at least 1")]
    EventQueueCapacity,

    /// Ramp time negative or not finite.
    #[error("ramp_time_ms must be finite and non-negative, got {0}")]
    RampTime(f32),

    /// Chain entry of a kind the host does not know.
    #[error("unknown module kind '{kind}' at chain slot {slot}")]
    UnknownModule {
        /// Chain slot.
        slot: usize,
        /// Module kind as written.
        kind: String,
    },

    /// Initial value for a parameter the module does not have.
    #[error("unknown parameter '{param}' for module '{kind}' at chain slot {slot}")]
    UnknownModuleParam {
        /// Chain slot.
        slot: usize,
        /// Module kind.
        kind: String,
        /// Parameter name as written.
        param: String,
    },

    /// Mapping to a slot past the end of the chain.
    #[error("mapping {mapping} targets module {module}, chain has {len}")]
    ModuleOutOfRange {
        /// Mapping index.
        mapping: usize,
        /// Targeted slot.
        module: usize,
        /// Chain length.
        len: usize,
    },

    /// Mapping to a parameter the module does not have.
    #[error("mapping {mapping} targets parameter {param} of module {module}, which has {count}")]
    ParamOutOfRange {
        /// Mapping index.
        mapping: usize,
        /// Targeted slot.
        module: usize,
        /// Targeted parameter index.
        param: usize,
        /// Number of parameters of the module.
        count: usize,
    },

    /// Encoder step not strictly positive.
    #[error("mapping {mapping}: step must be positive, got {step}")]
    InvalidStep {
        /// Mapping index.
        mapping: usize,
        /// Offending step.
        step: f32,
    },

    /// Notch outside the normalized range.
    #[error("mapping {mapping}: notch {notch} outside [-1, 1]")]
    NotchOutOfRange {
        /// Mapping index.
        mapping: usize,
        /// Offending notch.
        notch: f32,
    },

    /// Two absolute controls on one parameter.
    #[error("module {module} parameter {param} has more than one absolute control")]
    DuplicateAbsolute {
        /// Targeted slot.
        module: usize,
        /// Targeted parameter index.
        param: usize,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Modules the host can build, by kind.
pub trait ModuleCatalog {
    /// Global parameter names of `kind` in index order, or `None` if the
    /// kind is unknown.
    fn param_names(&self, kind: &str) -> Option<&[&str]>;
}

/// Checks everything that does not depend on the available modules.
pub fn validate_config(config: &EngineConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();
    check_structure(config, &mut errors);
    finish(errors)
}

/// [`validate_config`] plus module kinds, initial parameter names and
/// mapped parameter indices.
pub fn validate_with_catalog(
    config: &EngineConfig,
    catalog: &dyn ModuleCatalog,
) -> ValidationResult<()> {
    let mut errors = Vec::new();
    check_structure(config, &mut errors);

    for (slot, module) in config.chain.iter().enumerate() {
        let Some(names) = catalog.param_names(&module.kind) else {
            errors.push(ValidationError::UnknownModule {
                slot,
                kind: module.kind.clone(),
            });
            continue;
        };
        for param in module.params.keys() {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(param)) {
                errors.push(ValidationError::UnknownModuleParam {
                    slot,
                    kind: module.kind.clone(),
                    param: param.clone(),
                });
            }
        }
    }

    for (i, mapping) in config.mappings.iter().enumerate() {
        let count = config
            .chain
            .get(mapping.module)
            .and_then(|m| catalog.param_names(&m.kind))
            .map(<[&str]>::len);
        if let Some(count) = count
            && mapping.param >= count
        {
            errors.push(ValidationError::ParamOutOfRange {
                mapping: i,
                module: mapping.module,
                param: mapping.param,
                count,
            });
        }
    }

    finish(errors)
}

fn check_structure(config: &EngineConfig, errors: &mut Vec<ValidationError>) {
    let transport = &config.transport;
    if !(transport.sample_rate.is_finite() && transport.sample_rate > 0.0) {
        errors.push(ValidationError::SampleRate(transport.sample_rate));
    }
    if !RESOLUTION_RANGE.contains(&transport.resolution_bits) {
        errors.push(ValidationError::ResolutionBits(transport.resolution_bits));
    }
    if transport.output_channels == 0 {
        errors.push(ValidationError::NoOutputChannels);
    }

    let engine = &config.engine;
    if engine.event_queue_capacity == 0 {
        errors.push(ValidationError::EventQueueCapacity);
    }
    if !(engine.ramp_time_ms.is_finite() && engine.ramp_time_ms >= 0.0) {
        errors.push(ValidationError::RampTime(engine.ramp_time_ms));
    }

    let mut absolute = BTreeSet::new();
    for (i, mapping) in config.mappings.iter().enumerate() {
        if mapping.module >= config.chain.len() {
            errors.push(ValidationError::ModuleOutOfRange {
                mapping: i,
                module: mapping.module,
                len: config.chain.len(),
            });
        }
        let link = &mapping.link;
        if !(link.step.is_finite() && link.step > 0.0) {
            errors.push(ValidationError::InvalidStep {
                mapping: i,
                step: link.step,
            });
        }
        for &notch in &link.notches {
            if !(-1.0..=1.0).contains(&notch) {
                errors.push(ValidationError::NotchOutOfRange { mapping: i, notch });
            }
        }
        if link.abs && !absolute.insert((mapping.module, mapping.param)) {
            errors.push(ValidationError::DuplicateAbsolute {
                module: mapping.module,
                param: mapping.param,
            });
        }
    }
}

fn finish(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
