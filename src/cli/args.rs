//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Modulir incremental build engine CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (optional; defaults apply when absent)
    #[arg(short = 'C', long, default_value = "modulir.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a single build round
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build, then rebuild whenever sources change
    #[command(visible_alias = "w")]
    Watch {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Watch and serve the target directory over HTTP
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve the target directory once the first round succeeded
        #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        http: Option<bool>,
    },
}

/// Shared build arguments for every command
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Source directory (relative to the current directory)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub source: Option<PathBuf>,

    /// Target directory (relative to the current directory)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub target: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Treat every path as changed in the first round
    #[arg(short, long)]
    pub force: bool,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

impl Commands {
    pub fn build_args(&self) -> &BuildArgs {
        match self {
            Self::Build { build_args }
            | Self::Watch { build_args }
            | Self::Serve { build_args, .. } => build_args,
        }
    }
}
