//! `[watch]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [watch]
//! debounce_ms = 50    # Quiet window before a batch of changes is released
//! quick = true        # Watch-triggered rounds only consider the changed paths
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File watching settings for `watch` and `serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Milliseconds without new events before a rebuild starts.
    /// `0` starts immediately; events arriving during a round are always
    /// collected into the next one.
    pub debounce_ms: u64,

    /// Quick-path mode for watch-triggered rounds: the reported paths are the
    /// only ones considered changed, no filesystem stat.
    pub quick: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            quick: true,
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
