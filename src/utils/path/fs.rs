//! Path normalization utilities.
//!
//! Every path that reaches the change cache or the watcher goes through
//! [`normalize_path`], so keys from `changed()` calls and keys from notify
//! events line up.

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// For paths that don't exist (deleted sources, outputs not built yet) the
/// parent directory is canonicalized instead and the file name re-attached,
/// so a file keeps the same key before and after it is removed.
/// Falls back to a lexical cleanup against the current directory.
///
/// # Example
/// ```ignore
/// let abs = normalize_path(Path::new("./content/post.md"));
/// ```
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = absolutize(path);
    if let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name())
        && let Ok(parent) = parent.canonicalize()
    {
        return parent.join(name);
    }

    absolute
}

/// Resolve a path that may be relative to a base directory.
///
/// Always returns an absolute path.
#[inline]
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        return clean(path);
    }
    normalize_path(&base_dir.join(path))
}

/// Join with the current directory (if relative) and lexically clean.
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return clean(path);
    }
    let joined = std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path));
    clean(&joined)
}

/// Lexically remove `.` and `..` components.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
