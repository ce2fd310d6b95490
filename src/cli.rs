use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "variantforge")]
#[command(author, version, about = "Randomized media variant generator and transcoding relay")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay and queue server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate variants of one or more files
    Generate {
        /// Input files; more than one runs in batch mode
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Preset JSON file
        #[arg(long)]
        preset: PathBuf,

        /// Variants per input
        #[arg(short = 'n', long, default_value_t = 1)]
        copies: u32,

        /// Video backend: local or remote (overrides config)
        #[arg(long)]
        backend: Option<String>,

        /// Output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a preset JSON file
    ValidatePreset {
        /// Preset file to validate
        file: PathBuf,

        /// Reject inverted ranges instead of swapping them
        #[arg(long)]
        strict: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Display version information
    Version,
}
