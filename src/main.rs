//! Modulir - an incremental build engine for static sites.

mod cli;
mod config;
mod core;
mod engine;
mod logger;
mod site;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{SiteConfig, init_config};
use engine::Context;
use site::Site;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = init_config(SiteConfig::load(&cli)?);
    debug!(
        "config";
        "source {}, target {}, {} workers",
        config.build.source.display(),
        config.build.target.display(),
        config.build.concurrency
    );

    let site = Site::new(config.build.extra.clone());
    let build = move |ctx: &Context| site.build(ctx);

    match &cli.command {
        Commands::Build { .. } => cli::build::run_build(&config, &build),
        Commands::Watch { .. } => cli::build::run_watch(&config, &build),
        Commands::Serve { .. } => cli::serve::run_serve(&config, &build),
    }
}
