//! `build` and `watch` commands.

use crate::{
    config::SiteConfig,
    core::finish_signal,
    engine::{BuildFn, build_loop, build_once},
    utils::plural::plural_count,
};
use anyhow::{Result, bail};

/// Run a single round. Any error makes the command fail.
pub fn run_build(config: &SiteConfig, build: &BuildFn) -> Result<()> {
    let outcome = build_once(config, build)?;
    if !outcome.is_ok() {
        bail!("build failed with {}", plural_count(outcome.errors.len(), "error"));
    }
    Ok(())
}

/// Build, then rebuild on every change until Ctrl+C.
pub fn run_watch(config: &SiteConfig, build: &BuildFn) -> Result<()> {
    build_loop(config, build, &finish_signal(), || {})
}
