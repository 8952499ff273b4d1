//! Mtime-based change cache.
//!
//! Two generations of `path → mtime`:
//!
//! - **committed**: authoritative at round start, untouched while jobs run
//! - **pending**: observations made during the current round
//!
//! `promote()` folds pending into committed. It runs once per round, before
//! the build function is invoked, so it never races with job queries.
//!
//! Comparisons look at pending first: the first job to notice a modification
//! records it, and every later query in the same round compares against that
//! newer value and answers `false`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Outcome of a single change query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Path never seen before (or reappeared after removal).
    New,
    /// Stored mtime is older than the file's current mtime.
    Modified,
    /// Nothing happened since the last observation.
    Unchanged,
    /// Path was tracked and no longer exists.
    Removed,
    /// Path doesn't exist and was never tracked (e.g. an output not built yet).
    Missing,
    /// Stat failed for a reason other than not-found.
    Unreadable,
    /// Forced mode: everything counts as changed.
    Forced,
    /// Quick-path mode: path is in the allow-list.
    QuickHit,
    /// Quick-path mode: path is not in the allow-list.
    QuickMiss,
}

impl Change {
    /// Collapse to the boolean answer jobs act on.
    pub const fn is_changed(self) -> bool {
        !matches!(self, Self::Unchanged | Self::QuickMiss)
    }

    /// Whether the path is gone from disk.
    pub const fn is_gone(self) -> bool {
        matches!(self, Self::Removed | Self::Missing)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
            Self::Removed => "removed",
            Self::Missing => "missing",
            Self::Unreadable => "unreadable",
            Self::Forced => "forced",
            Self::QuickHit => "quick",
            Self::QuickMiss => "quick-skip",
        }
    }
}

/// Pending observation for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observation {
    Seen(SystemTime),
    /// Tracked path that disappeared; promotion drops it from committed.
    Gone,
}

#[derive(Default)]
struct Generations {
    committed: FxHashMap<PathBuf, SystemTime>,
    pending: FxHashMap<PathBuf, Observation>,
    /// Paths seen for the first time, drained by the watcher registration.
    fresh: Vec<PathBuf>,
}

/// Shared change cache, queried concurrently from jobs.
#[derive(Default)]
pub struct ChangeCache {
    inner: Mutex<Generations>,
}

impl ChangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stat `path` and compare against the stored mtime, recording new
    /// observations into the pending generation.
    ///
    /// `path` must already be normalized.
    pub fn observe(&self, path: &Path) -> Change {
        // Stat outside the lock: jobs hit this from many threads at once.
        let mtime = std::fs::metadata(path).and_then(|m| m.modified());

        match mtime {
            Ok(mtime) => self.record(path, mtime),
            Err(e) if e.kind() == ErrorKind::NotFound => self.record_missing(path),
            Err(e) => {
                crate::log!("error"; "stat {}: {}", path.display(), e);
                Change::Unreadable
            }
        }
    }

    fn record(&self, path: &Path, mtime: SystemTime) -> Change {
        let mut guard = self.inner.lock();
        let generations = &mut *guard;

        let stored = match generations.pending.get(path) {
            Some(Observation::Seen(t)) => Some(*t),
            Some(Observation::Gone) => None,
            None => generations.committed.get(path).copied(),
        };

        match stored {
            None => {
                let first_sight = !generations.committed.contains_key(path)
                    && !generations.pending.contains_key(path);
                if first_sight {
                    generations.fresh.push(path.to_path_buf());
                }
                generations
                    .pending
                    .insert(path.to_path_buf(), Observation::Seen(mtime));
                Change::New
            }
            Some(stored) if stored < mtime => {
                generations
                    .pending
                    .insert(path.to_path_buf(), Observation::Seen(mtime));
                Change::Modified
            }
            Some(_) => Change::Unchanged,
        }
    }

    fn record_missing(&self, path: &Path) -> Change {
        let mut generations = self.inner.lock();
        let tracked =
            generations.committed.contains_key(path) || generations.pending.contains_key(path);

        if tracked {
            crate::debug!("cache"; "removed: {}", path.display());
            generations
                .pending
                .insert(path.to_path_buf(), Observation::Gone);
            Change::Removed
        } else {
            crate::debug!("cache"; "missing: {}", path.display());
            Change::Missing
        }
    }

    /// Merge this round's observations into the committed generation.
    ///
    /// Returns the number of entries promoted.
    pub fn promote(&self) -> usize {
        let mut guard = self.inner.lock();
        let generations = &mut *guard;
        let count = generations.pending.len();

        for (path, observation) in generations.pending.drain() {
            match observation {
                Observation::Seen(mtime) => {
                    generations.committed.insert(path, mtime);
                }
                Observation::Gone => {
                    generations.committed.remove(&path);
                }
            }
        }

        count
    }

    /// Paths known to the committed generation.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.inner.lock().committed.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Drain paths observed for the first time since the last call.
    pub fn take_fresh(&self) -> Vec<PathBuf> {
        std::mem::take(&mut self.inner.lock().fresh)
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.inner.lock().committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of observations waiting for promotion.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}
