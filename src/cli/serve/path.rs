//! URL to filesystem path resolution.

use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

/// Resolve a request URL to a file under `serve_root`.
///
/// Directories resolve to their `index.html`. Anything escaping the root
/// (`..`, symlinks) resolves to `None`.
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url)?;
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let canonical = serve_root.join(&clean).canonicalize().ok()?;
    let root = serve_root.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    let index = canonical.join("index.html");
    (canonical.is_dir() && index.is_file()).then_some(index)
}

/// Strip query and fragment, decode, trim slashes.
fn normalize_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    Some(decoded.trim_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "home").unwrap();
        fs::create_dir(dir.path().join("posts")).unwrap();
        fs::write(dir.path().join("posts/index.html"), "posts").unwrap();
        fs::write(dir.path().join("posts/hello world.md"), "hi").unwrap();
        dir
    }

    #[test]
    fn test_resolve_root_and_directory_index() {
        let dir = make_root();
        let root = dir.path().canonicalize().unwrap();

        assert_eq!(resolve_path("/", dir.path()), Some(root.join("index.html")));
        assert_eq!(
            resolve_path("/posts/?page=2", dir.path()),
            Some(root.join("posts/index.html"))
        );
    }

    #[test]
    fn test_resolve_percent_encoded() {
        let dir = make_root();
        let resolved = resolve_path("/posts/hello%20world.md", dir.path()).unwrap();
        assert!(resolved.ends_with("posts/hello world.md"));
    }

    #[test]
    fn test_reject_traversal_and_missing() {
        let dir = make_root();
        assert_eq!(resolve_path("/../etc/passwd", dir.path()), None);
        assert_eq!(resolve_path("/%2e%2e/secret", dir.path()), None);
        assert_eq!(resolve_path("/missing.html", dir.path()), None);
    }
}
