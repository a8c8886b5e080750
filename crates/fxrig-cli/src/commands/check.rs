//! Configuration check command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use fxrig_config::{EngineConfig, default_config_path};

use crate::modules::Catalog;

#[derive(Args)]
pub struct CheckArgs {
    /// Configuration file (defaults to the user configuration)
    config: Option<PathBuf>,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let path = args.config.unwrap_or_else(default_config_path);
    let config = EngineConfig::load(&path)
        .with_context(|| format!("checking {}", path.display()))?;
    config
        .validate_with(&Catalog)
        .with_context(|| format!("checking {}", path.display()))?;

    let transport = &config.transport;
    println!("{}: ok", path.display());
    println!(
        "  Device:   {}",
        transport.driver.as_deref().unwrap_or("(default)")
    );
    println!(
        "  Format:   {} Hz, {} in / {} out, {} bits",
        transport.sample_rate,
        transport.input_channels,
        transport.output_channels,
        transport.resolution_bits
    );
    match transport.buffer_size {
        Some(size) => println!("  Block:    {size} frames"),
        None => println!("  Block:    device preference"),
    }
    let chain: Vec<String> = config
        .chain
        .iter()
        .map(|m| {
            if m.bypassed {
                format!("!{}", m.kind)
            } else {
                m.kind.clone()
            }
        })
        .collect();
    println!("  Chain:    {}", chain.join(" -> "));
    println!("  Mappings: {}", config.mappings.len());

    Ok(())
}
