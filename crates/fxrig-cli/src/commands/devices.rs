//! Audio device listing command.

use clap::Args;
use fxrig_io::list_devices;

#[derive(Args)]
pub struct DevicesArgs {
    /// Only list devices that can play audio
    #[arg(long)]
    outputs_only: bool,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    let devices = list_devices()?;

    if devices.is_empty() {
        println!("No audio devices found.");
        return Ok(());
    }

    println!("Available Audio Devices");
    println!("=======================\n");

    let inputs: Vec<_> = devices.iter().filter(|d| d.is_input).collect();
    if !inputs.is_empty() && !args.outputs_only {
        println!("Input Devices:");
        for (idx, device) in inputs.iter().enumerate() {
            let also_output = if device.is_output {
                " (also output)"
            } else {
                ""
            };
            println!(
                "  [{}] {} ({} Hz){}",
                idx, device.name, device.default_sample_rate, also_output
            );
        }
        println!();
    }

    let outputs: Vec<_> = devices.iter().filter(|d| d.is_output).collect();
    if !outputs.is_empty() {
        println!("Output Devices:");
        for (idx, device) in outputs.iter().enumerate() {
            let also_input = if device.is_input { " (also input)" } else { "" };
            println!(
                "  [{}] {} ({} Hz){}",
                idx, device.name, device.default_sample_rate, also_input
            );
        }
        println!();
    }

    println!(
        "Total: {} input(s), {} output(s)",
        inputs.len(),
        outputs.len()
    );
    println!();
    println!("Tip: select a device by full or partial name:");
    println!("  fxrig run --driver \"USB\"");

    Ok(())
}
