//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "content"      # Source root, watched in loop mode
//! target = "public"       # Output root
//! concurrency = 30        # Worker threads per round
//! extra = "static"        # Optional directory copied best-effort
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 30;

/// Build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Source directory (relative to the config file).
    pub source: PathBuf,

    /// Output directory (relative to the config file).
    pub target: PathBuf,

    /// Number of jobs running at the same time.
    pub concurrency: usize,

    /// Optional extra directory merged into the output.
    /// Missing or unreadable is logged, never fatal.
    pub extra: Option<PathBuf>,

    /// Treat every path as changed (CLI `--force`).
    #[serde(skip)]
    pub force: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("content"),
            target: PathBuf::from("public"),
            concurrency: DEFAULT_CONCURRENCY,
            extra: None,
            force: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::config::test_parse_config;

    #[test]
    fn test_build_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.source, PathBuf::from("content"));
        assert_eq!(config.build.target, PathBuf::from("public"));
        assert_eq!(config.build.concurrency, super::DEFAULT_CONCURRENCY);
        assert!(config.build.extra.is_none());
        assert!(!config.build.force);
    }

    #[test]
    fn test_build_config_override() {
        let config = test_parse_config(
            "[build]\nsource = \"src\"\ntarget = \"dist\"\nconcurrency = 4\nextra = \"static\"",
        );
        assert_eq!(config.build.source, PathBuf::from("src"));
        assert_eq!(config.build.target, PathBuf::from("dist"));
        assert_eq!(config.build.concurrency, 4);
        assert_eq!(config.build.extra, Some(PathBuf::from("static")));
    }
}
