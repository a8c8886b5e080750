//! Configuration for the fxrig audio engine.
//!
//! An [`EngineConfig`] is read from a TOML file and describes one complete
//! setup: which device to open and in which format, which modules to chain,
//! and which controls drive which parameters.
//!
//! # Features
//!
//! - **Loading**: [`EngineConfig::load`] reads, parses and validates a file
//! - **Validation**: structural checks, plus module checks against a
//!   host-provided [`ModuleCatalog`]
//! - **Paths**: platform config directory and default file location
//!
//! # Example
//!
//! ```rust
//! use fxrig_config::EngineConfig;
//!
//! let config = EngineConfig::from_toml(r#"
//!     [transport]
//!     sample_rate = 48000
//!
//!     [[chain]]
//!     kind = "gain"
//!
//!     [[mappings]]
//!     module = 0
//!     param = 0
//!     link = { source = { kind = "pedal", index = 0 }, abs = true }
//! "#).unwrap();
//!
//! assert_eq!(config.chain[0].kind, "gain");
//! assert!(config.mappings[0].link.abs);
//! ```

mod config;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

/// Configuration validation.
pub mod validation;

pub use config::{EngineConfig, EngineSection, MappingConfig, ModuleConfig, TransportSection};
pub use error::ConfigError;
pub use paths::{default_config_path, ensure_user_config_dir, find_config, user_config_dir};
pub use validation::{
    ModuleCatalog, ValidationError, ValidationResult, validate_config, validate_with_catalog,
};
