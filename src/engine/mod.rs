//! Incremental build engine.
//!
//! # Module Structure
//!
//! ```text
//! engine/
//! ├── cache.rs       # ChangeCache: committed/pending mtimes
//! ├── pool.rs        # Pool: fixed workers, explicit rounds
//! ├── context.rs     # Context: the API build functions and jobs see
//! ├── error.rs       # BuildError
//! ├── driver.rs      # build_once / build_loop
//! └── watch/         # FsWatcher + WatchBridge (event coalescing)
//! ```
//!
//! A build function receives a `Context`, enqueues jobs with `add_job`, asks
//! `changed(path)` to skip work whose inputs didn't move, and calls `wait()`
//! between phases. The driver runs it once, or in a loop fed by the watcher.

pub mod cache;
pub mod context;
pub mod driver;
pub mod error;
pub mod pool;
pub mod watch;

pub use cache::{Change, ChangeCache};
pub use context::{Context, QuickPaths, Stats, allow_error, allow_result};
pub use driver::{BuildFn, MAX_LOGGED_ERRORS, RoundOutcome, build_loop, build_once, run_round};
pub use error::BuildError;
pub use pool::{Job, JobSummary, Outcome, Pool, RoundReport};
