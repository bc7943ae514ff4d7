//! CLI Module
//!
//! Command-line front end for running the pedal core against WAV files.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stompbox - effects pedal core
#[derive(Parser, Debug)]
#[command(name = "stompbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the registered effects
    #[command(name = "effects")]
    Effects,

    /// Run a WAV file through the effect chain, sample by sample
    #[command(name = "process")]
    Process {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file (32-bit float mono)
        output: PathBuf,

        /// Effect list, one name per line (default: every registered effect)
        #[arg(short, long)]
        chain: Option<PathBuf>,

        /// Config file with `key, on|off, value` lines
        #[arg(short = 'f', long)]
        config: Option<PathBuf>,
    },

    /// Render a chord of pitch-shifted voices offline
    #[command(name = "chord")]
    Chord {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Voice shifts in semitones, e.g. `--semitones 0 4 7`
        #[arg(short, long, num_args = 1.., required = true, allow_negative_numbers = true)]
        semitones: Vec<f32>,

        /// Directory for intermediate renders
        #[arg(short, long)]
        work_dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chord_with_negative_shift() {
        let cli = Cli::try_parse_from([
            "stompbox", "chord", "in.wav", "out.wav", "--semitones", "-12", "0", "7",
        ])
        .unwrap();
        match cli.command {
            Commands::Chord { semitones, .. } => assert_eq!(semitones, vec![-12.0, 0.0, 7.0]),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_process_options() {
        let cli = Cli::try_parse_from([
            "stompbox", "-v", "process", "in.wav", "out.wav", "--chain", "fx.txt",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Process { chain, config, .. } => {
                assert_eq!(chain, Some(PathBuf::from("fx.txt")));
                assert!(config.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
