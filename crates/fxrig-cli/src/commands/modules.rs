//! Module listing command.

use clap::Args;

use crate::modules::{KINDS, create};

#[derive(Args)]
pub struct ModulesArgs {
    /// Show a single module kind
    kind: Option<String>,
}

pub fn run(args: ModulesArgs) -> anyhow::Result<()> {
    let kinds: Vec<&str> = match &args.kind {
        Some(kind) if KINDS.contains(&kind.as_str()) => vec![kind.as_str()],
        Some(kind) => anyhow::bail!("unknown module kind '{kind}' (available: {})", KINDS.join(", ")),
        None => KINDS.to_vec(),
    };

    println!("Available Modules");
    println!("=================\n");

    for kind in kinds {
        let Some(module) = create(kind) else {
            continue;
        };
        let params = module.param_set();
        println!("{kind}");
        for (index, key) in params.keys().enumerate() {
            let desc = params.desc(key);
            let suffix = desc.unit.suffix();
            println!(
                "  [{index}] {:<10} {:.1}{suffix} .. {:.1}{suffix} (default {:.1}{suffix})",
                desc.name,
                desc.nrm_to_nat(desc.domain.min()),
                desc.nrm_to_nat(desc.domain.max()),
                desc.nrm_to_nat(desc.default),
            );
        }
        println!();
    }

    Ok(())
}
