//! Command-line interface for ctorch-rs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Drive libtorch tensors and TorchScript models through ctorch-rs.
#[derive(Parser, Debug)]
#[command(name = "ctorch-rs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a TorchScript model's forward pass on JSON input.
    Run {
        /// Path to the TorchScript model. Defaults to `model.path` from the config file.
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Path to input data (JSON `{"data": [...], "shape": [...]}` or a list of them).
        #[arg(short, long)]
        input: PathBuf,

        /// Device to run on (cpu, cuda). Overrides the config file.
        #[arg(short, long)]
        device: Option<String>,

        /// Element type of the inputs (float32, float64, ...). Overrides the config file.
        #[arg(long)]
        dtype: Option<String>,

        /// Output format (json, pretty).
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Path to optional YAML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also print the output tensor with libtorch's formatter.
        #[arg(long)]
        print: bool,
    },

    /// Show build and runtime information, optionally loading a model.
    Info {
        /// Path to a TorchScript model to load.
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Create, print and synchronize tensors on a device.
    TestDevice {
        /// Device to test (cpu, cuda).
        #[arg(short, long, default_value = "cpu")]
        device: String,

        /// Element type to create.
        #[arg(long, default_value = "float32")]
        dtype: String,
    },
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
