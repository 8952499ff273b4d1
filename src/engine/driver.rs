//! Build loop driver.
//!
//! ```text
//! build_once:  Context ──► run_round ──► summary
//!
//! build_loop:  FsWatcher ──► WatchBridge thread ──► Batch ─┐
//!              run_round (full) ──► on_first_run           │
//!              loop { select! { batch => run_round (quick) ◄┘ ──► RebuildDone
//!                               finish => break } }
//! ```

use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use anyhow::{Context as _, Result};
use crossbeam::channel::{self, Receiver};

use super::context::{Context, QuickPaths, Stats};
use super::error::{BuildError, panic_message};
use super::watch::{BridgeMsg, FsWatcher, WatchBridge};
use crate::config::SiteConfig;
use crate::logger::{status_detach, status_error, status_success};
use crate::utils::plural::plural_count;
use crate::{debug, debug_do, log};

/// A build function: enqueues jobs through the context, may call
/// `ctx.wait()` between phases, and returns its own errors.
pub type BuildFn = dyn Fn(&Context) -> Vec<BuildError> + Send + Sync;

/// Errors printed per round before collapsing into "and N more".
pub const MAX_LOGGED_ERRORS: usize = 10;

const SLOWEST_JOBS: usize = 5;

/// Result of one loop iteration.
#[derive(Debug)]
pub struct RoundOutcome {
    pub round: u64,
    pub errors: Vec<BuildError>,
    pub stats: Stats,
}

impl RoundOutcome {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// `round #N: 12ms (build 2ms, wait 10ms) jobs 3/40 (1 errored)`
    pub fn summary(&self) -> String {
        let stats = &self.stats;
        format!(
            "round #{}: {:.1?} (build {:.1?}, wait {:.1?}) jobs {}/{} ({} errored)",
            self.round,
            stats.total_duration,
            stats.build_duration,
            stats.wait_duration,
            stats.executed(),
            stats.total(),
            self.errors.len(),
        )
    }
}

/// Run one round: promote, build, drain, collect.
///
/// A panicking build function is reported as an error of the round; the
/// pool is still drained so the next round can start.
pub fn run_round(
    ctx: &Context,
    build: &BuildFn,
    forced: bool,
    quick: Option<QuickPaths>,
) -> RoundOutcome {
    let round = ctx.begin_round(forced, quick);

    let mut errors = match catch_unwind(AssertUnwindSafe(|| build(ctx))) {
        Ok(errors) => errors,
        Err(payload) => vec![BuildError::Panic {
            name: "<build>".into(),
            message: panic_message(payload.as_ref()),
        }],
    };
    errors.extend(ctx.finish_round());

    let stats = ctx.stats();
    debug_do! {
        for job in stats.slowest(SLOWEST_JOBS) {
            debug!("round"; "slow: {} ({:.1?})", job.name, job.duration);
        }
    }

    RoundOutcome {
        round,
        errors,
        stats,
    }
}

/// Error messages capped at `MAX_LOGGED_ERRORS`.
pub fn error_lines(errors: &[BuildError]) -> Vec<String> {
    let mut lines: Vec<String> = errors
        .iter()
        .take(MAX_LOGGED_ERRORS)
        .map(ToString::to_string)
        .collect();
    if errors.len() > MAX_LOGGED_ERRORS {
        lines.push(format!("... and {} more", errors.len() - MAX_LOGGED_ERRORS));
    }
    lines
}

fn log_errors(errors: &[BuildError]) {
    for line in error_lines(errors) {
        log!("error"; "{}", line);
    }
}

/// Run a single round over the configured source and target.
pub fn build_once(config: &SiteConfig, build: &BuildFn) -> Result<RoundOutcome> {
    let ctx = prepare_context(config)?;
    let outcome = run_round(&ctx, build, config.build.force, None);

    log!("build"; "{}", outcome.summary());
    log_errors(&outcome.errors);
    Ok(outcome)
}

/// Run rounds until `finish` fires or the watcher goes away.
///
/// The first round is a full one (forced if configured). `on_first_run` is
/// called once, after the first round without errors. Failed rounds never
/// stop the loop.
pub fn build_loop<F>(
    config: &SiteConfig,
    build: &BuildFn,
    finish: &Receiver<()>,
    on_first_run: F,
) -> Result<()>
where
    F: FnOnce(),
{
    let ctx = prepare_context(config)?;

    // Watcher first: edits made during the initial round are buffered.
    let (bridge_tx, bridge_rx) = channel::unbounded();
    let (round_tx, round_rx) = channel::unbounded();
    let mut watcher = FsWatcher::new(&[ctx.source().to_path_buf()], bridge_tx.clone())
        .context("failed to start file watcher")?;
    let bridge = WatchBridge::new(bridge_rx, round_tx, config.watch.debounce());
    let bridge_handle = thread::Builder::new()
        .name("modulir-watch".into())
        .spawn(move || bridge.run())
        .context("failed to spawn watch bridge")?;

    crate::core::set_loop_active(true);
    let mut on_first_run = Some(on_first_run);

    let outcome = run_round(&ctx, build, config.build.force, None);
    settle(&ctx, &mut watcher, &outcome, &mut on_first_run);

    loop {
        crossbeam::select! {
            recv(round_rx) -> batch => {
                let Ok(batch) = batch else { break };
                if crate::core::is_shutdown() {
                    break;
                }
                debug!("watch"; "changed: {}", plural_count(batch.len(), "path"));

                let quick = config.watch.quick.then(|| Arc::new(batch));
                let outcome = run_round(&ctx, build, false, quick);
                settle(&ctx, &mut watcher, &outcome, &mut on_first_run);

                if bridge_tx.send(BridgeMsg::RebuildDone).is_err() {
                    break;
                }
            }
            recv(finish) -> _ => break,
        }
    }

    crate::core::set_loop_active(false);
    let _ = bridge_tx.send(BridgeMsg::Finish);
    drop(watcher);
    if bridge_handle.join().is_err() {
        log!("watch"; "bridge thread panicked");
    }
    Ok(())
}

/// Post-round bookkeeping shared by every loop iteration.
fn settle<F: FnOnce()>(
    ctx: &Context,
    watcher: &mut FsWatcher,
    outcome: &RoundOutcome,
    on_first_run: &mut Option<F>,
) {
    watcher.watch_paths(&ctx.take_fresh_paths());

    // Verbose lines printed during the round must not be overwritten.
    if crate::logger::is_verbose() {
        status_detach();
    }

    if outcome.is_ok() {
        status_success(&outcome.summary());
        if let Some(first) = on_first_run.take() {
            first();
        }
    } else {
        status_error(&outcome.summary(), &error_lines(&outcome.errors).join("\n"));
    }
}

fn prepare_context(config: &SiteConfig) -> Result<Context> {
    let target = &config.build.target;
    fs::create_dir_all(target)
        .with_context(|| format!("failed to create target `{}`", target.display()))?;
    Ok(Context::new(
        config.build.concurrency,
        &config.build.source,
        target,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn make_config(dir: &TempDir) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.build.source = dir.path().join("content");
        config.build.target = dir.path().join("public");
        config.build.concurrency = 4;
        fs::create_dir_all(&config.build.source).unwrap();
        config
    }

    fn make_context(dir: &TempDir) -> Context {
        prepare_context(&make_config(dir)).unwrap()
    }

    #[test]
    fn test_run_round_collects_job_and_build_errors() {
        let dir = TempDir::new().unwrap();
        let ctx = make_context(&dir);

        let build = |ctx: &Context| {
            ctx.add_job("ok", || Ok(true));
            ctx.add_job("broken", || anyhow::bail!("bad input"));
            vec![BuildError::Other(anyhow::anyhow!("index unavailable"))]
        };
        let outcome = run_round(&ctx, &build, false, None);

        assert_eq!(outcome.round, 1);
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.stats.total(), 2);
        assert_eq!(outcome.stats.executed(), 1);
        assert!(!outcome.is_ok());
        assert!(outcome.summary().starts_with("round #1:"));
    }

    #[test]
    fn test_run_round_skips_later_phase_on_error() {
        let dir = TempDir::new().unwrap();
        let ctx = make_context(&dir);
        let phase2 = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&phase2);
        let build = move |ctx: &Context| {
            ctx.add_job("phase1", || anyhow::bail!("nope"));
            let errors = ctx.wait();
            if !errors.is_empty() {
                return errors;
            }
            let counter = Arc::clone(&counter);
            ctx.add_job("phase2", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            });
            Vec::new()
        };
        let outcome = run_round(&ctx, &build, false, None);

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].job_name(), Some("phase1"));
        assert_eq!(phase2.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.stats.phases, 2);
    }

    #[test]
    fn test_run_round_survives_panicking_build_fn() {
        let dir = TempDir::new().unwrap();
        let ctx = make_context(&dir);

        let build = |ctx: &Context| -> Vec<BuildError> {
            ctx.add_job("queued", || Ok(true));
            panic!("build function bug");
        };
        let outcome = run_round(&ctx, &build, false, None);
        assert!(matches!(outcome.errors[0], BuildError::Panic { .. }));
        // The queued job still ran and the pool is reusable.
        assert_eq!(outcome.stats.executed(), 1);

        let outcome = run_round(&ctx, &|_: &Context| Vec::new(), false, None);
        assert!(outcome.is_ok());
        assert_eq!(outcome.round, 2);
    }

    #[test]
    fn test_error_lines_are_capped() {
        let errors: Vec<_> = (0..13)
            .map(|i| BuildError::Other(anyhow::anyhow!("error {i}")))
            .collect();
        let lines = error_lines(&errors);

        assert_eq!(lines.len(), MAX_LOGGED_ERRORS + 1);
        assert_eq!(lines.last().unwrap(), "... and 3 more");
        assert_eq!(error_lines(&errors[..2]).len(), 2);
    }

    #[test]
    fn test_build_once_creates_target() {
        let dir = TempDir::new().unwrap();
        let config = make_config(&dir);

        let outcome = build_once(&config, &|ctx: &Context| {
            ctx.add_job("noop", || Ok(false));
            Vec::new()
        })
        .unwrap();

        assert!(outcome.is_ok());
        assert!(config.build.target.is_dir());
    }

    #[test]
    fn test_build_loop_first_run_and_finish() {
        let dir = TempDir::new().unwrap();
        let config = make_config(&dir);
        let (finish_tx, finish_rx) = channel::bounded(1);
        let (first_tx, first_rx) = channel::bounded(1);
        let rounds = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&rounds);
        let handle = thread::spawn(move || {
            let build = move |_: &Context| {
                counter.fetch_add(1, Ordering::SeqCst);
                Vec::new()
            };
            build_loop(&config, &build, &finish_rx, || {
                first_tx.send(()).unwrap();
            })
        });

        first_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        finish_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();
        assert!(rounds.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_build_loop_failed_first_round_defers_first_run() {
        let dir = TempDir::new().unwrap();
        let config = make_config(&dir);
        let (finish_tx, finish_rx) = channel::bounded(1);
        let fired = Arc::new(AtomicUsize::new(0));
        let (round_tx, round_rx) = channel::unbounded();

        let flag = Arc::clone(&fired);
        let handle = thread::spawn(move || {
            let build = move |ctx: &Context| {
                round_tx.send(ctx.round()).unwrap();
                vec![BuildError::Other(anyhow::anyhow!("always failing"))]
            };
            build_loop(&config, &build, &finish_rx, || {
                flag.fetch_add(1, Ordering::SeqCst);
            })
        });

        // The loop keeps running after the failure and still honours finish.
        assert_eq!(round_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
        finish_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
