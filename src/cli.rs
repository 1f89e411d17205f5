use std::path::PathBuf;

use clap::{Parser, Subcommand};

use voxrange::dsp::pitch::EstimatorKind;

#[derive(Parser)]
#[command(name = "voxrange")]
#[command(about = "Sing into the mic, see your pitch live, and find out your voice range")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List available audio input devices
    Devices,

    /// Record from the microphone with live pitch, then classify the range
    Record {
        /// Also write the recording to this WAV file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Pitch estimator (overrides config)
        #[arg(long, value_enum)]
        estimator: Option<EstimatorKind>,
    },

    /// Classify the voice range of an existing WAV file
    Analyze {
        /// Path to a WAV file
        path: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Pitch estimator (overrides config)
        #[arg(long, value_enum)]
        estimator: Option<EstimatorKind>,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Show where config files are stored
    Paths,
}
