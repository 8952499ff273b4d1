//! Demo build function: mirror the source tree into the target and write a
//! page index.
//!
//! ```text
//! phase 1: copy <rel>    one per source file, skipped when unchanged
//!          remove <rel>  one per tracked file that vanished
//!          extra         best-effort copy of `build.extra`
//!          ── ctx.wait() ──  (errors end the round here)
//! phase 2: index         index.html listing every page
//! ```

mod index;

use crate::{
    engine::{BuildError, Change, Context, allow_result, watch::is_editor_artifact},
    utils::path::normalize_path,
};
use anyhow::{Context as _, Result, anyhow};
use jwalk::WalkDir;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Accumulators for one round, shared with jobs.
#[derive(Default)]
struct SiteState {
    /// Source-relative paths of every page copied or confirmed fresh.
    pages: Mutex<Vec<PathBuf>>,
    /// Jobs that did work this round.
    executed: AtomicUsize,
}

impl SiteState {
    fn record(&self, executed: bool) -> bool {
        if executed {
            self.executed.fetch_add(1, Ordering::Relaxed);
        }
        executed
    }
}

/// The demo site.
#[derive(Debug, Clone, Default)]
pub struct Site {
    /// Directory copied into the target root; failures are only logged.
    extra: Option<PathBuf>,
}

impl Site {
    pub fn new(extra: Option<PathBuf>) -> Self {
        Self { extra }
    }

    /// Build function entry point.
    pub fn build(&self, ctx: &Context) -> Vec<BuildError> {
        let state = Arc::new(SiteState::default());

        let files = match collect_source_files(ctx.source(), ctx.target()) {
            Ok(files) => files,
            Err(e) => return vec![e.into()],
        };

        for file in &files {
            add_copy_job(ctx, &state, file);
        }
        add_remove_jobs(ctx, &state, &files);
        if let Some(extra) = &self.extra {
            add_extra_job(ctx, &state, extra);
        }

        let errors = ctx.wait();
        if !errors.is_empty() {
            return errors;
        }

        add_index_job(ctx, &state);
        Vec::new()
    }
}

/// Every eligible file under `source`, normalized and sorted.
fn collect_source_files(source: &Path, target: &Path) -> Result<Vec<PathBuf>> {
    if !source.is_dir() {
        return Err(anyhow!("source `{}` is not a directory", source.display()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(source)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| !is_editor_artifact(path) && !path.starts_with(target))
        .map(|path| normalize_path(&path))
        .collect();
    files.sort();
    Ok(files)
}

fn relative(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}

fn add_copy_job(ctx: &Context, state: &Arc<SiteState>, file: &Path) {
    let rel = relative(file, ctx.source());
    let src = file.to_path_buf();
    let dst = ctx.target().join(&rel);
    let job_ctx = ctx.clone();
    let state = Arc::clone(state);

    ctx.add_job(format!("copy {}", rel.display()), move || {
        let executed = copy_if_changed(&job_ctx, &src, &dst)?;
        state.pages.lock().push(rel);
        Ok(state.record(executed))
    });
}

/// Copy `src` to `dst` when the source changed or the output is missing.
fn copy_if_changed(ctx: &Context, src: &Path, dst: &Path) -> Result<bool> {
    let changed = ctx.changed(src);
    if !changed && dst.exists() {
        return Ok(false);
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(true)
}

fn add_remove_jobs(ctx: &Context, state: &Arc<SiteState>, files: &[PathBuf]) {
    let present: FxHashSet<&Path> = files.iter().map(PathBuf::as_path).collect();

    let vanished = ctx
        .tracked_paths()
        .into_iter()
        .filter(|path| path.starts_with(ctx.source()) && !present.contains(path.as_path()));

    for path in vanished {
        let rel = relative(&path, ctx.source());
        let dst = ctx.target().join(&rel);
        let job_ctx = ctx.clone();
        let state = Arc::clone(state);

        ctx.add_job(format!("remove {}", rel.display()), move || {
            let gone = match job_ctx.change_kind(&path) {
                change if change.is_gone() => true,
                Change::QuickHit | Change::Forced => !path.exists(),
                _ => false,
            };
            if !gone || !dst.exists() {
                return Ok(false);
            }
            fs::remove_file(&dst)
                .with_context(|| format!("failed to remove {}", dst.display()))?;
            Ok(state.record(true))
        });
    }
}

fn add_extra_job(ctx: &Context, state: &Arc<SiteState>, extra: &Path) {
    let extra = extra.to_path_buf();
    let job_ctx = ctx.clone();
    let state = Arc::clone(state);

    ctx.add_job("extra", move || {
        let executed = allow_result(copy_extra(&job_ctx, &extra));
        Ok(state.record(executed))
    });
}

/// Copy changed files of `extra` into the target root.
fn copy_extra(ctx: &Context, extra: &Path) -> Result<bool> {
    if !extra.is_dir() {
        return Err(anyhow!("extra directory `{}` not found", extra.display()));
    }

    let base = normalize_path(extra);
    let files = collect_source_files(&base, ctx.target())?;
    let mut executed = false;
    for file in &files {
        let dst = ctx.target().join(relative(file, &base));
        executed |= copy_if_changed(ctx, file, &dst)?;
    }
    Ok(executed)
}

fn add_index_job(ctx: &Context, state: &Arc<SiteState>) {
    let index = ctx.target().join("index.html");
    let source_index = ctx.source().join("index.html");
    let forced = ctx.is_forced();
    let state = Arc::clone(state);

    ctx.add_job("index", move || {
        // A hand-written index wins over the generated one.
        if source_index.is_file() {
            return Ok(false);
        }
        let executed = state.executed.load(Ordering::Relaxed) > 0;
        if !(forced || executed || !index.exists()) {
            return Ok(false);
        }

        let mut pages = std::mem::take(&mut *state.pages.lock());
        pages.sort();
        fs::write(&index, index::render(&pages))
            .with_context(|| format!("failed to write {}", index.display()))?;
        Ok(true)
    });
}

#[cfg(test)]
mod tests;
