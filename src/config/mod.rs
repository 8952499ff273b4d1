//! Site configuration management for `modulir.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build]
//! │   ├── serve      # [serve]
//! │   └── watch      # [watch]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError
//! │   └── handle     # Global config handle
//! └── mod.rs         # SiteConfig (this file)
//! ```
//!
//! The config file is optional: without one, defaults apply and the project
//! root is the current directory. CLI flags override file values.

pub mod section;
pub mod types;

pub use section::{BuildConfig, DEFAULT_CONCURRENCY, ServeConfig, WatchConfig};
pub use types::{ConfigError, cfg, init_config};

use crate::{
    cli::{BuildArgs, Cli, Commands},
    debug, log,
    utils::path::{normalize_path, resolve_path},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing modulir.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// File watching settings
    #[serde(default)]
    pub watch: WatchConfig,
}

impl SiteConfig {
    /// Load configuration from CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let config_path = normalize_path(&cwd.join(&cli.config));

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            debug!("config"; "{} not found, using defaults", config_path.display());
            Self::default()
        };

        let root = config_path
            .parent()
            .map_or_else(|| cwd.clone(), Path::to_path_buf);
        config.config_path = config_path;
        config.set_root(&root);
        config.normalize_paths();
        config.apply_command_options(cli, &cwd);
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::from)?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} (ignored):", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.root = path.to_path_buf();
    }

    /// Get path relative to the site root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    /// Resolve file paths against the project root.
    fn normalize_paths(&mut self) {
        let root = self.root.clone();
        self.build.source = resolve_path(&self.build.source, &root);
        self.build.target = resolve_path(&self.build.target, &root);
        if let Some(extra) = self.build.extra.take() {
            self.build.extra = Some(resolve_path(&extra, &root));
        }
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-specific configuration options.
    ///
    /// CLI paths are relative to the current directory.
    fn apply_command_options(&mut self, cli: &Cli, cwd: &Path) {
        self.apply_build_args(cli.command.build_args(), cwd);

        if let Commands::Serve {
            interface,
            port,
            http,
            ..
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.http, http.as_ref());
        }
    }

    /// Apply build arguments from CLI.
    fn apply_build_args(&mut self, args: &BuildArgs, cwd: &Path) {
        crate::logger::set_verbose(args.verbose);

        if let Some(source) = &args.source {
            self.build.source = resolve_path(source, cwd);
        }
        if let Some(target) = &args.target {
            self.build.target = resolve_path(target, cwd);
        }
        Self::update_option(&mut self.build.concurrency, args.concurrency.as_ref());
        self.build.force = args.force;
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Reject configurations that can't produce a sane build loop.
    pub fn validate(&self) -> Result<()> {
        if self.build.concurrency == 0 {
            return Err(ConfigError::Validation("build.concurrency must be at least 1".into()).into());
        }

        if !self.build.source.is_dir() {
            return Err(ConfigError::Validation(format!(
                "source directory `{}` does not exist",
                self.root_relative(&self.build.source).display()
            ))
            .into());
        }

        // Output inside the watched tree would retrigger itself forever
        if self.build.target.starts_with(&self.build.source) {
            return Err(ConfigError::Validation(format!(
                "target `{}` must not be inside source `{}`",
                self.root_relative(&self.build.target).display(),
                self.root_relative(&self.build.source).display()
            ))
            .into());
        }

        Ok(())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config from TOML. Panics on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SiteConfig {
    let (parsed, ignored) = SiteConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
