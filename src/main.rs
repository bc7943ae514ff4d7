//! Stompbox CLI
//!
//! Offline front end for the pedal core.

use clap::Parser;
use env_logger::Env;
use log::debug;

use stompbox::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("Stompbox v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Effects => commands::list_effects(cli.json),
        Commands::Process {
            input,
            output,
            chain,
            config,
        } => commands::process(
            &input,
            &output,
            chain.as_deref(),
            config.as_deref(),
            cli.json,
        ),
        Commands::Chord {
            input,
            output,
            semitones,
            work_dir,
        } => commands::chord(&input, &output, &semitones, work_dir.as_deref(), cli.json),
    }
}
