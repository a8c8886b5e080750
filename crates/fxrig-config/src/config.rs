//! Engine configuration file format.

use std::collections::BTreeMap;
use std::path::Path;

use fxrig_core::ParamKey;
use fxrig_core::param_desc::DEFAULT_RAMP_TIME;
use fxrig_io::TransportConfig;
use fxrig_io::dispatch::DEFAULT_EVENT_CAPACITY;
use fxrig_platform::{ControlTarget, CtrlLink};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths::default_config_path;
use crate::validation::{ModuleCatalog, validate_config, validate_with_catalog};

/// Everything needed to bring the engine up: device settings, the module
/// chain and the control mappings.
///
/// Every section is optional; an empty file describes a stereo 48 kHz setup
/// on the default device with an empty chain.
///
/// # TOML Format
///
/// ```toml
/// [transport]
/// driver = "Speakers"
/// sample_rate = 48000
/// buffer_size = 256
///
/// [engine]
/// event_queue_capacity = 1024
///
/// [[chain]]
/// kind = "gain"
/// [chain.params]
/// level = -6.0
///
/// [[mappings]]
/// module = 0
/// param = 0
/// [mappings.link]
/// source = { kind = "pot", index = 0 }
/// abs = true
/// notches = [0.5]
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Device and format settings.
    #[serde(default)]
    pub transport: TransportSection,

    /// Dispatch settings.
    #[serde(default)]
    pub engine: EngineSection,

    /// Modules in processing order. The index is the module slot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<ModuleConfig>,

    /// Control links.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<MappingConfig>,
}

/// `[transport]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Device name, matched exactly then as a case-insensitive substring.
    /// The default device when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// First device input channel used.
    pub input_channel_base: usize,
    /// First device output channel used.
    pub output_channel_base: usize,
    /// Input channels used.
    pub input_channels: usize,
    /// Output channels used.
    pub output_channels: usize,
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Block size in frames; the device preference when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    /// Effective bits of the device words.
    pub resolution_bits: u32,
}

impl Default for TransportSection {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            driver: None,
            input_channel_base: 0,
            output_channel_base: 0,
            input_channels: transport.input_channels,
            output_channels: transport.output_channels,
            sample_rate: transport.sample_rate,
            buffer_size: transport.buffer_size,
            resolution_bits: transport.resolution_bits,
        }
    }
}

impl TransportSection {
    /// Settings for [`fxrig_io::DriverTransport::new`].
    pub fn to_transport_config(&self) -> TransportConfig {
        TransportConfig {
            sample_rate: self.sample_rate,
            buffer_size: self.buffer_size,
            input_channels: self.input_channels,
            output_channels: self.output_channels,
            resolution_bits: self.resolution_bits,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Events drained per block at most.
    pub event_queue_capacity: usize,
    /// Ramp time of continuous parameters, in milliseconds.
    pub ramp_time_ms: f32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            event_queue_capacity: DEFAULT_EVENT_CAPACITY,
            ramp_time_ms: DEFAULT_RAMP_TIME * 1000.0,
        }
    }
}

impl EngineSection {
    /// Ramp time in seconds.
    pub fn ramp_time(&self) -> f32 {
        self.ramp_time_ms / 1000.0
    }
}

/// One `[[chain]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Module kind, resolved by the host.
    pub kind: String,

    /// Skipped by the dispatcher when set.
    #[serde(default)]
    pub bypassed: bool,

    /// Initial parameter values, by name, in natural units.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, f32>,
}

impl ModuleConfig {
    /// Entry of the given kind with default parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            bypassed: false,
            params: BTreeMap::new(),
        }
    }

    /// Sets an initial parameter value.
    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// One `[[mappings]]` entry: a control link on a global parameter of a
/// chain module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Chain slot.
    pub module: usize,
    /// Global parameter index within the module.
    pub param: usize,
    /// The link itself.
    pub link: CtrlLink,
}

impl MappingConfig {
    /// Mapping of `link` onto parameter `param` of slot `module`.
    pub fn new(module: usize, param: usize, link: CtrlLink) -> Self {
        Self {
            module,
            param,
            link,
        }
    }

    /// Address of the mapped parameter.
    pub fn target(&self) -> ControlTarget {
        ControlTarget::new(self.module, ParamKey::global(self.param))
    }
}

impl EngineConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            modules = config.chain.len(),
            mappings = config.mappings.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Loads `path`, or the default configuration file when `path` is
    /// `None`. A missing default file yields the default configuration; a
    /// missing explicit file is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default = default_config_path();
        if default.is_file() {
            Self::load(default)
        } else {
            tracing::debug!(path = %default.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parses and validates a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Converts the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Saves the configuration, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Checks the configuration on its own. See [`validate_config`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(validate_config(self)?)
    }

    /// Checks the configuration against the modules the host can build.
    pub fn validate_with(&self, catalog: &dyn ModuleCatalog) -> Result<(), ConfigError> {
        Ok(validate_with_catalog(self, catalog)?)
    }

    /// Mappings targeting chain slot `slot`.
    pub fn mappings_for(&self, slot: usize) -> impl Iterator<Item = &MappingConfig> {
        self.mappings.iter().filter(move |m| m.module == slot)
    }
}
