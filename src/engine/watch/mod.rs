//! File watcher bridge.
//!
//! Turns raw notify events into rebuild batches. Implements the
//! "Watcher-First" pattern: the watcher starts before the first round, so
//! edits made during the initial build are buffered, not lost.
//!
//! ```text
//! notify ──► BridgeMsg::Fs ──┐
//! driver ──► RebuildDone ────┼──► WatchBridge (Coalescer) ──► Batch ──► driver
//! ctrl+c ──► Finish ─────────┘
//! ```
//!
//! Raw events and round-completion signals travel through the same channel,
//! so the bridge sees them in the order they happened.

mod coalescer;
mod filter;


pub use coalescer::{Batch, Coalescer};
pub use filter::{is_editor_artifact, should_rebuild};

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use crate::utils::path::normalize_path;

/// A debounce window never stretches past this many debounce periods, so a
/// steady stream of events still releases batches.
const MAX_DEBOUNCE_PERIODS: u32 = 10;

/// Messages consumed by the bridge.
#[derive(Debug)]
pub enum BridgeMsg {
    /// Raw filesystem event.
    Fs(notify::Event),
    /// The round started from the previous batch completed.
    RebuildDone,
    /// Stop the bridge.
    Finish,
}

/// Coalesces raw events into non-overlapping rebuild batches.
pub struct WatchBridge {
    rx: Receiver<BridgeMsg>,
    rounds: Sender<Batch>,
    debounce: Duration,
}

impl WatchBridge {
    /// `debounce`: quiet window after the last eligible event before a batch
    /// is released, capped at `MAX_DEBOUNCE_PERIODS` windows after the first
    /// one. Zero releases immediately.
    pub fn new(rx: Receiver<BridgeMsg>, rounds: Sender<Batch>, debounce: Duration) -> Self {
        Self {
            rx,
            rounds,
            debounce,
        }
    }

    /// Run until `Finish`, or until either channel is closed.
    pub fn run(self) {
        let mut coalescer = Coalescer::new();
        let mut deadline: Option<Instant> = None;
        let mut window_start: Option<Instant> = None;

        loop {
            let msg = match deadline {
                // A flood of events must not keep an expired window open.
                Some(at) if at <= Instant::now() => None,
                Some(at) => match self.rx.recv_deadline(at) {
                    Ok(msg) => Some(msg),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.rx.recv() {
                    Ok(msg) => Some(msg),
                    Err(_) => break,
                },
            };

            match msg {
                // Debounce window elapsed
                None => {
                    deadline = None;
                    window_start = None;
                }
                Some(BridgeMsg::Fs(event)) => {
                    if !coalescer.add(eligible_paths(&event)) {
                        continue;
                    }
                    if !self.debounce.is_zero() {
                        let now = Instant::now();
                        let start = *window_start.get_or_insert(now);
                        let cap = start + self.debounce * MAX_DEBOUNCE_PERIODS;
                        deadline = Some((now + self.debounce).min(cap));
                        continue;
                    }
                }
                Some(BridgeMsg::RebuildDone) => coalescer.finish(),
                Some(BridgeMsg::Finish) => break,
            }

            if deadline.is_some() {
                continue;
            }

            if let Some(batch) = coalescer.take_ready() {
                crate::debug!("watch"; "rebuild triggered by {} path(s)", batch.len());
                if self.rounds.send(batch).is_err() {
                    break;
                }
            }
        }

        crate::debug!("watch"; "bridge stopped");
    }
}

/// Normalized paths of `event` that may trigger a rebuild.
///
/// Modify events on directories (rename/attribute artifacts) are dropped: the
/// files inside produce their own events.
pub fn eligible_paths(event: &notify::Event) -> Vec<PathBuf> {
    event
        .paths
        .iter()
        .filter(|path| !(matches!(event.kind, EventKind::Modify(_)) && path.is_dir()))
        .filter(|path| should_rebuild(path, &event.kind))
        .map(|path| normalize_path(path))
        .collect()
}

/// Owns the notify watcher and tracks what is being watched.
pub struct FsWatcher {
    watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
    watched: FxHashSet<PathBuf>,
}

impl FsWatcher {
    /// Start watching `roots` recursively, forwarding events into `tx`.
    ///
    /// Non-existent roots are skipped.
    pub fn new(roots: &[PathBuf], tx: Sender<BridgeMsg>) -> notify::Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let _ = tx.send(BridgeMsg::Fs(event));
                }
                Err(e) => crate::log!("watch"; "notify error: {}", e),
            }
        })?;

        let mut watched_roots = Vec::with_capacity(roots.len());
        for root in roots {
            if root.exists() {
                let root = normalize_path(root);
                watcher.watch(&root, RecursiveMode::Recursive)?;
                crate::debug!("watch"; "watching {}", root.display());
                watched_roots.push(root);
            }
        }

        Ok(Self {
            watcher,
            roots: watched_roots,
            watched: FxHashSet::default(),
        })
    }

    /// Make sure changes to `paths` reach the bridge.
    ///
    /// Paths under a recursive root are already covered. For the rest the
    /// parent directory is watched, which survives editors that save by
    /// replacing the file.
    pub fn watch_paths(&mut self, paths: &[PathBuf]) {
        for path in paths {
            if self.is_covered(path) {
                continue;
            }
            let Some(dir) = path.parent() else {
                continue;
            };
            if !self.watched.insert(dir.to_path_buf()) {
                continue;
            }
            match self.watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => crate::debug!("watch"; "watching {}", dir.display()),
                Err(e) => {
                    self.watched.remove(dir);
                    crate::log!("watch"; "cannot watch {}: {}", dir.display(), e);
                }
            }
        }
    }

    fn is_covered(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }
}
