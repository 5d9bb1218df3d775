//! CLI definitions for `pages`.

use crate::pipeline::Operation;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Static-site build pipeline
#[derive(Parser, Debug)]
#[command(name = "pages", author, version, about, long_about = None)]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Override file (default: pages.config.yaml, .yml or .json in the project root)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Delete the output and intermediate directories
    Clean,

    /// Build the site into the output directory
    Build,

    /// Compile, serve with live reload and rebuild on change
    Dev {
        /// Port for the dev server (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Lint scripts under the source directory
    Lint,

    /// Build, then publish the output to the configured git branch
    Deploy,

    /// Print the effective configuration
    Config,
}

impl Command {
    /// The pipeline operation this command runs, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Command::Clean => Some(Operation::Clean),
            Command::Build => Some(Operation::Build),
            Command::Dev { .. } => Some(Operation::Dev),
            Command::Lint => Some(Operation::Lint),
            Command::Deploy => Some(Operation::Deploy),
            Command::Config => None,
        }
    }
}
