use std::path::Path;

use notify::EventKind;
use notify::event::ModifyKind;

/// Decide whether a raw filesystem event may trigger a rebuild.
///
/// Pure: looks only at the path and the event kind, never at the disk.
pub fn should_rebuild(path: &Path, kind: &EventKind) -> bool {
    match kind {
        // Reads, and backend-specific noise
        EventKind::Access(_) | EventKind::Other => return false,
        // Permission / timestamp-only changes (chmod, touch -a) may
        // otherwise trigger endless rebuild loops
        EventKind::Modify(ModifyKind::Metadata(_)) => return false,
        _ => {}
    }

    !is_editor_artifact(path)
}

/// Swap, backup and lock files written by editors and file managers.
pub fn is_editor_artifact(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(
        ext,
        "swp" | "swo" | "swx" | "tmp" | "bak" | "bck" | "backup"
    ) || name.ends_with('~')
        // vim probes directory writability with this name
        || name == "4913"
        // emacs lock / autosave
        || name.starts_with(".#")
        || (name.len() > 1 && name.starts_with('#') && name.ends_with('#'))
        || name == ".DS_Store"
}
