//! Build context: the only interface build functions and jobs see.
//!
//! The context is created once per process and reused by every round. It is
//! `Clone` (an `Arc` inside) so job closures can carry their own handle and
//! query `changed()` from worker threads.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;

use super::cache::{Change, ChangeCache};
use super::error::BuildError;
use super::pool::{Job, JobSummary, Outcome, Pool, RoundReport};
use crate::utils::path::normalize_path;

/// Allow-list that replaces filesystem stats in quick-path mode.
pub type QuickPaths = Arc<FxHashSet<PathBuf>>;

/// Counters for one loop iteration, accumulated across phases.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub round: u64,
    pub jobs: Vec<JobSummary>,
    pub errored: usize,
    pub phases: usize,
    pub started: Option<Instant>,
    /// Time spent inside the build function, waits excluded.
    pub build_duration: Duration,
    /// Time spent blocked on the pool.
    pub wait_duration: Duration,
    /// Wall time of the whole round.
    pub total_duration: Duration,
}

impl Stats {
    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn executed(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.outcome == Outcome::Executed)
            .count()
    }

    /// The `n` slowest jobs that did work, slowest first.
    pub fn slowest(&self, n: usize) -> Vec<&JobSummary> {
        let mut executed: Vec<_> = self
            .jobs
            .iter()
            .filter(|j| j.outcome != Outcome::Skipped)
            .collect();
        executed.sort_by(|a, b| b.duration.cmp(&a.duration));
        executed.truncate(n);
        executed
    }

    fn absorb(&mut self, report: &mut RoundReport, waited: Duration) {
        self.errored += report.errors.len();
        self.jobs.append(&mut report.jobs);
        self.phases += 1;
        self.wait_duration += waited;
    }
}

/// Per-round query mode.
#[derive(Default)]
struct Mode {
    forced: bool,
    quick: Option<QuickPaths>,
}

struct Inner {
    cache: ChangeCache,
    pool: Pool,
    source: PathBuf,
    target: PathBuf,
    mode: RwLock<Mode>,
    stats: Mutex<Stats>,
}

/// Shared build context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    pub fn new(concurrency: usize, source: &Path, target: &Path) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: ChangeCache::new(),
                pool: Pool::new(concurrency),
                source: normalize_path(source),
                target: normalize_path(target),
                mode: RwLock::new(Mode::default()),
                stats: Mutex::new(Stats::default()),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Job-facing API
    // ------------------------------------------------------------------------

    /// Enqueue a job into the current phase.
    ///
    /// The closure must own its inputs: snapshot anything it needs before
    /// calling this.
    pub fn add_job<F>(&self, name: impl Into<String>, work: F)
    where
        F: FnOnce() -> anyhow::Result<bool> + Send + 'static,
    {
        self.inner.pool.add_job(Job::new(name, work));
    }

    /// Whether `path` changed since the last committed round.
    pub fn changed(&self, path: impl AsRef<Path>) -> bool {
        self.change_kind(path).is_changed()
    }

    /// Like `changed`, but checks every path. Never short-circuits, so each
    /// path is observed and registered for watching.
    pub fn changed_any<I, P>(&self, paths: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .fold(false, |any, path| self.changed(path) | any)
    }

    /// Detailed change classification for `path`.
    pub fn change_kind(&self, path: impl AsRef<Path>) -> Change {
        let path = normalize_path(path.as_ref());
        let mode = self.inner.mode.read();

        if mode.forced {
            // Still observe so the path gets a baseline and a watch.
            self.inner.cache.observe(&path);
            return Change::Forced;
        }

        if let Some(quick) = &mode.quick {
            if !quick.contains(&path) {
                return Change::QuickMiss;
            }
            // Record reported paths so later rounds know they exist, or that
            // they are gone.
            self.inner.cache.observe(&path);
            return Change::QuickHit;
        }
        drop(mode);

        let change = self.inner.cache.observe(&path);
        if change.is_changed() {
            crate::debug!("changed"; "{}: {}", change.label(), path.display());
        }
        change
    }

    /// Run a best-effort effect: an error is logged, never propagated.
    pub fn allow_error<E: Display>(&self, executed: bool, err: Option<E>) -> bool {
        allow_error(executed, err)
    }

    /// Phase barrier: drain every job enqueued so far, then reopen the pool
    /// for the next phase. Returns this phase's errors.
    pub fn wait(&self) -> Vec<BuildError> {
        let errors = self.drain();
        self.inner.pool.start_round(self.round());
        errors
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    pub fn stats(&self) -> Stats {
        self.inner.stats.lock().clone()
    }

    pub fn round(&self) -> u64 {
        self.inner.stats.lock().round
    }

    pub fn is_forced(&self) -> bool {
        self.inner.mode.read().forced
    }

    pub fn quick_paths(&self) -> Option<QuickPaths> {
        self.inner.mode.read().quick.clone()
    }

    pub fn source(&self) -> &Path {
        &self.inner.source
    }

    pub fn target(&self) -> &Path {
        &self.inner.target
    }

    /// Source paths committed by previous rounds.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.inner.cache.tracked_paths()
    }

    // ------------------------------------------------------------------------
    // Driver API
    // ------------------------------------------------------------------------

    /// Start a round: promote last round's observations, reset stats, set
    /// the query mode and open the pool.
    pub(crate) fn begin_round(&self, forced: bool, quick: Option<QuickPaths>) -> u64 {
        let promoted = self.inner.cache.promote();

        let round = {
            let mut stats = self.inner.stats.lock();
            let round = stats.round + 1;
            *stats = Stats {
                round,
                started: Some(Instant::now()),
                ..Stats::default()
            };
            round
        };

        *self.inner.mode.write() = Mode { forced, quick };
        crate::debug!("round"; "#{} start (promoted {}, forced {})", round, promoted, forced);

        self.inner.pool.start_round(round);
        round
    }

    /// Drain the last phase and close the round. Returns its errors.
    pub(crate) fn finish_round(&self) -> Vec<BuildError> {
        let errors = self.drain();

        let mut stats = self.inner.stats.lock();
        if let Some(started) = stats.started {
            stats.total_duration = started.elapsed();
            stats.build_duration = stats.total_duration.saturating_sub(stats.wait_duration);
        }
        errors
    }

    /// Paths seen for the first time since the last call (for watching).
    pub(crate) fn take_fresh_paths(&self) -> Vec<PathBuf> {
        self.inner.cache.take_fresh()
    }

    fn drain(&self) -> Vec<BuildError> {
        let waited = Instant::now();
        let mut report = self.inner.pool.wait();
        let waited = waited.elapsed();

        self.inner.stats.lock().absorb(&mut report, waited);
        report.errors
    }
}

/// Downgrade an error to a log line. Always returns `executed` unchanged.
///
/// Used for optional integrations whose absence shouldn't fail the build.
pub fn allow_error<E: Display>(executed: bool, err: Option<E>) -> bool {
    if let Some(err) = err {
        crate::log!("allowed"; "{}", err);
    }
    executed
}

/// `allow_error` for a job-style result. An error counts as "no work done".
pub fn allow_result(result: anyhow::Result<bool>) -> bool {
    match result {
        Ok(executed) => executed,
        Err(err) => allow_error(false, Some(format!("{err:#}"))),
    }
}
