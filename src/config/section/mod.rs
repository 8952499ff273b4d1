//! Configuration section definitions.
//!
//! | Section   | Purpose                                       |
//! |-----------|-----------------------------------------------|
//! | `[build]` | Source/target roots, concurrency, extra dir   |
//! | `[serve]` | HTTP server (interface, port, enable)         |
//! | `[watch]` | Event debounce, quick-path rebuilds           |

mod build;
mod serve;
mod watch;

pub use build::{BuildConfig, DEFAULT_CONCURRENCY};
pub use serve::ServeConfig;
pub use watch::WatchConfig;
