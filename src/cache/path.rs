//! Key to storage path resolution

use std::path::{Path, PathBuf};

/// Suffix of every payload file
pub const ENTRY_SUFFIX: &str = ".json";

/// Maps a cache key to the file holding its payload under `root`.
///
/// The key is trimmed, spaces and `/` become `-`, each `.` starts a new
/// directory level, and anything outside `[A-Za-z0-9_-]` is dropped. Keys are
/// programmer-chosen identifiers; two keys that differ only in dropped or folded
/// characters map to the same file.
///
/// Pure and deterministic: no filesystem access.
pub fn resolve(root: &Path, key: &str) -> PathBuf {
    let cleaned: String = key
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' => '-',
            '.' => '/',
            other => other,
        })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
        .collect();

    let relative = format!("{cleaned}{ENTRY_SUFFIX}");

    // Empty segments (from "a..b" or a leading '.') collapse, so nothing can
    // escape the root.
    let mut path = root.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

/// Directory named after the key itself: the payload path minus its suffix
pub(crate) fn key_dir(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(ENTRY_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(path.with_file_name(stem))
}
