//! Global config handle.
//!
//! Uses `arc-swap` for lock-free reads from request and worker threads.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;

use crate::config::SiteConfig;

/// Global config storage.
pub static CONFIG: LazyLock<ArcSwap<SiteConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(SiteConfig::default()));

#[inline]
pub fn cfg() -> Arc<SiteConfig> {
    CONFIG.load_full()
}

/// Publish the loaded config and return a handle to it.
#[inline]
pub fn init_config(config: SiteConfig) -> Arc<SiteConfig> {
    let arc = Arc::new(config);
    CONFIG.store(Arc::clone(&arc));
    arc
}
