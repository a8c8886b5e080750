//! fxrig - command-line host for the fxrig audio engine.

mod commands;
mod modules;
mod rig;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fxrig")]
#[command(author, version, about = "Real-time effect rig driven by hardware controls", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the effect chain on an audio device
    Run(commands::run::RunArgs),

    /// List audio devices
    Devices(commands::devices::DevicesArgs),

    /// List available modules and their parameters
    Modules(commands::modules::ModulesArgs),

    /// Validate a configuration file
    CheckConfig(commands::check::CheckArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Modules(args) => commands::modules::run(args),
        Commands::CheckConfig(args) => commands::check::run(args),
    }
}
