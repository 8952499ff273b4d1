use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashSet;
use tempfile::TempDir;

use super::Site;
use crate::engine::{Context, RoundOutcome, run_round};
use crate::utils::path::normalize_path;

struct Fixture {
    _dir: TempDir,
    ctx: Context,
    site: Site,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Self {
        Self::with_extra(files, None)
    }

    fn with_extra(files: &[(&str, &str)], extra: Option<&str>) -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("content");
        let target = dir.path().join("public");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();
        for (rel, body) in files {
            write(&source.join(rel), body);
        }

        let site = Site::new(extra.map(|e| dir.path().join(e)));
        let ctx = Context::new(4, &source, &target);
        Self {
            _dir: dir,
            ctx,
            site,
        }
    }

    fn round(&self, forced: bool) -> RoundOutcome {
        let site = self.site.clone();
        run_round(&self.ctx, &move |ctx: &Context| site.build(ctx), forced, None)
    }

    fn quick_round(&self, changed: &[&str]) -> RoundOutcome {
        let quick: FxHashSet<_> = changed
            .iter()
            .map(|rel| normalize_path(&self.ctx.source().join(rel)))
            .collect();
        let site = self.site.clone();
        run_round(
            &self.ctx,
            &move |ctx: &Context| site.build(ctx),
            false,
            Some(Arc::new(quick)),
        )
    }

    fn source(&self, rel: &str) -> std::path::PathBuf {
        self.ctx.source().join(rel)
    }

    fn target(&self, rel: &str) -> std::path::PathBuf {
        self.ctx.target().join(rel)
    }
}

fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// Rewrite and push the mtime forward so the change is visible regardless
/// of filesystem timestamp granularity.
fn edit(path: &Path, body: &str) {
    let before = fs::metadata(path).unwrap().modified().unwrap();
    fs::write(path, body).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(before + Duration::from_secs(10)).unwrap();
}

fn executed_names(outcome: &RoundOutcome) -> Vec<String> {
    let mut names: Vec<_> = outcome
        .stats
        .jobs
        .iter()
        .filter(|j| j.outcome == crate::engine::Outcome::Executed)
        .map(|j| j.name.clone())
        .collect();
    names.sort();
    names
}

#[test]
fn test_first_round_copies_everything_and_writes_index() {
    let fx = Fixture::new(&[("a.md", "alpha"), ("posts/b.md", "beta")]);

    let outcome = fx.round(false);

    assert!(outcome.is_ok(), "{:?}", outcome.errors);
    assert_eq!(fs::read_to_string(fx.target("a.md")).unwrap(), "alpha");
    assert_eq!(fs::read_to_string(fx.target("posts/b.md")).unwrap(), "beta");
    let index = fs::read_to_string(fx.target("index.html")).unwrap();
    assert!(index.contains("href=\"a.md\""));
    assert!(index.contains("href=\"posts/b.md\""));
    assert_eq!(outcome.stats.phases, 2);
}

#[test]
fn test_unchanged_round_does_no_work() {
    let fx = Fixture::new(&[("a.md", "alpha"), ("b.md", "beta")]);
    fx.round(false);

    let outcome = fx.round(false);

    assert!(outcome.is_ok());
    assert!(executed_names(&outcome).is_empty());
    // Jobs were still enqueued and skipped.
    assert_eq!(outcome.stats.total(), 3);
}

#[test]
fn test_edit_copies_only_that_file() {
    let fx = Fixture::new(&[("a.md", "alpha"), ("b.md", "beta")]);
    fx.round(false);

    edit(&fx.source("b.md"), "beta v2");
    let outcome = fx.round(false);

    assert_eq!(executed_names(&outcome), vec!["copy b.md", "index"]);
    assert_eq!(fs::read_to_string(fx.target("b.md")).unwrap(), "beta v2");
}

#[test]
fn test_deleted_source_removes_output() {
    let fx = Fixture::new(&[("a.md", "alpha"), ("old.md", "gone soon")]);
    fx.round(false);
    assert!(fx.target("old.md").exists());

    fs::remove_file(fx.source("old.md")).unwrap();
    let outcome = fx.round(false);

    assert!(outcome.is_ok());
    assert_eq!(executed_names(&outcome), vec!["index", "remove old.md"]);
    assert!(!fx.target("old.md").exists());
    let index = fs::read_to_string(fx.target("index.html")).unwrap();
    assert!(!index.contains("old.md"));

    // Promoted away: no remove job anymore.
    let outcome = fx.round(false);
    assert!(executed_names(&outcome).is_empty());
    assert_eq!(outcome.stats.total(), 2);
}

#[test]
fn test_missing_output_is_recreated() {
    let fx = Fixture::new(&[("a.md", "alpha")]);
    fx.round(false);

    fs::remove_file(fx.target("a.md")).unwrap();
    let outcome = fx.round(false);

    assert_eq!(executed_names(&outcome), vec!["copy a.md", "index"]);
    assert!(fx.target("a.md").exists());
}

#[test]
fn test_forced_round_redoes_everything() {
    let fx = Fixture::new(&[("a.md", "alpha")]);
    fx.round(false);

    let outcome = fx.round(true);
    assert_eq!(executed_names(&outcome), vec!["copy a.md", "index"]);
}

#[test]
fn test_phase_one_error_skips_index() {
    let fx = Fixture::new(&[("a.md", "alpha"), ("b.md", "beta")]);
    // A directory where the copy wants to put a file.
    fs::create_dir_all(fx.target("b.md")).unwrap();

    let outcome = fx.round(false);

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].job_name(), Some("copy b.md"));
    // The sibling still ran.
    assert!(fx.target("a.md").is_file());
    assert!(!fx.target("index.html").exists());
    assert!(!executed_names(&outcome).contains(&"index".to_string()));
}

#[test]
fn test_quick_round_only_touches_reported_paths() {
    let fx = Fixture::new(&[("a.md", "alpha"), ("b.md", "beta")]);
    fx.round(false);

    // Not reported: the quick round must not notice this edit.
    edit(&fx.source("a.md"), "alpha v2");
    edit(&fx.source("b.md"), "beta v2");
    let outcome = fx.quick_round(&["b.md"]);

    assert_eq!(executed_names(&outcome), vec!["copy b.md", "index"]);
    assert_eq!(fs::read_to_string(fx.target("a.md")).unwrap(), "alpha");
    assert_eq!(fs::read_to_string(fx.target("b.md")).unwrap(), "beta v2");
}

#[test]
fn test_quick_round_removes_reported_deletion() {
    let fx = Fixture::new(&[("a.md", "alpha"), ("old.md", "x")]);
    fx.round(false);

    fs::remove_file(fx.source("old.md")).unwrap();
    let outcome = fx.quick_round(&["old.md"]);

    assert!(outcome.is_ok());
    assert!(!fx.target("old.md").exists());
}

#[test]
fn test_file_created_and_deleted_during_quick_rounds_is_removed() {
    let fx = Fixture::new(&[("a.md", "alpha")]);
    fx.round(false);

    write(&fx.source("new.md"), "fresh");
    let outcome = fx.quick_round(&["new.md"]);
    assert_eq!(executed_names(&outcome), vec!["copy new.md", "index"]);
    assert!(fx.target("new.md").exists());

    fs::remove_file(fx.source("new.md")).unwrap();
    let outcome = fx.quick_round(&["new.md"]);

    assert!(outcome.is_ok(), "{:?}", outcome.errors);
    assert_eq!(executed_names(&outcome), vec!["index", "remove new.md"]);
    assert!(!fx.target("new.md").exists());
    let index = fs::read_to_string(fx.target("index.html")).unwrap();
    assert!(!index.contains("new.md"));
}

#[test]
fn test_missing_extra_is_allowed() {
    let fx = Fixture::with_extra(&[("a.md", "alpha")], Some("static"));

    let outcome = fx.round(false);

    assert!(outcome.is_ok(), "{:?}", outcome.errors);
    assert!(fx.target("a.md").exists());
}

#[test]
fn test_extra_is_copied_into_target_root() {
    let fx = Fixture::with_extra(&[("a.md", "alpha")], Some("static"));
    let extra = fx.ctx.source().parent().unwrap().join("static");
    write(&extra.join("css/site.css"), "body {}");

    let outcome = fx.round(false);

    assert!(outcome.is_ok());
    assert_eq!(fs::read_to_string(fx.target("css/site.css")).unwrap(), "body {}");
    assert!(executed_names(&outcome).contains(&"extra".to_string()));

    let outcome = fx.round(false);
    assert!(executed_names(&outcome).is_empty());
}

#[test]
fn test_editor_artifacts_not_copied() {
    let fx = Fixture::new(&[("a.md", "alpha"), (".a.md.swp", "swap")]);

    fx.round(false);

    assert!(fx.target("a.md").exists());
    assert!(!fx.target(".a.md.swp").exists());
}

#[test]
fn test_handwritten_index_wins() {
    let fx = Fixture::new(&[("index.html", "<p>mine</p>")]);

    let outcome = fx.round(false);

    assert!(outcome.is_ok());
    assert_eq!(
        fs::read_to_string(fx.target("index.html")).unwrap(),
        "<p>mine</p>"
    );
}
