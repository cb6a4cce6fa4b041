//! Payload persistence
//!
//! Reads, writes and deletes serialized payloads at already-resolved paths.
//! Failures are logged and reported as `false`/`None`; nothing here panics or
//! returns an error to the caller of the public cache API.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::path::key_dir;

/// Mode applied to payload files
#[cfg(unix)]
const FILE_MODE: u32 = 0o666;

/// Mode requested for created directories (the process umask still applies)
#[cfg(unix)]
const DIR_MODE: u32 = 0o777;

/// Error types for filesystem operations on cache entries
#[derive(Debug, Error)]
pub enum StoreError {
    /// A filesystem call failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The payload could not be encoded
    #[error("Failed to serialize payload for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The stored file does not hold a valid payload of the requested type
    #[error("Failed to deserialize {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Writes `payload` to `path`, creating parent directories as needed.
///
/// Returns `false` on any failure; the cause is logged.
pub fn write<T: Serialize + ?Sized>(path: &Path, payload: &T) -> bool {
    match try_write(path, payload) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "cache write failed");
            false
        }
    }
}

fn try_write<T: Serialize + ?Sized>(path: &Path, payload: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(payload).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, json).map_err(|e| StoreError::io(path, e))?;

    if let Err(e) = set_file_mode(path) {
        warn!(path = %path.display(), error = %e, "could not widen cache file permissions");
    }
    Ok(())
}

/// Reads and decodes the payload at `path`.
///
/// Returns `None` if the file is missing, unreadable or not a valid `T`.
pub fn read<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match try_read(path) {
        Ok(payload) => Some(payload),
        Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(error = %e, "cache read failed");
            None
        }
    }
}

fn try_read<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| StoreError::Deserialize {
        path: path.to_path_buf(),
        source,
    })
}

/// Removes the entry at `path`.
///
/// With `also_delete_directory`, the directory named after the key (the path
/// without its suffix) is removed with everything in it when it exists, and the
/// entry file itself is left alone. Otherwise only the file is removed. Removing
/// something already absent succeeds.
pub fn delete(path: &Path, also_delete_directory: bool) -> bool {
    if also_delete_directory {
        if let Some(dir) = key_dir(path).filter(|d| d.is_dir()) {
            return remove_dir_tree(&dir);
        }
    }
    remove_file(path)
}

/// Removes a single file, treating absence as success
pub fn remove_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed cache file");
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(error = %StoreError::io(path, e), "cache delete failed");
            false
        }
    }
}

/// Removes `dir` and everything below it, treating absence as success
pub fn remove_dir_tree(dir: &Path) -> bool {
    if !dir.is_dir() {
        return true;
    }
    match walk_and_remove(dir) {
        Ok(()) => {
            debug!(path = %dir.display(), "removed cache directory");
            true
        }
        Err(e) => {
            warn!(error = %e, "cache directory delete failed");
            false
        }
    }
}

/// Depth-first removal without recursion: files go as they are found, then
/// directories are removed deepest first.
fn walk_and_remove(root: &Path) -> Result<(), StoreError> {
    let mut pending = vec![root.to_path_buf()];
    let mut seen_dirs = Vec::new();

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| StoreError::io(&path, e))?;
            // Symlinks are unlinked, never followed
            if file_type.is_dir() {
                pending.push(path);
            } else {
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            }
        }
        seen_dirs.push(dir);
    }

    for dir in seen_dirs.iter().rev() {
        fs::remove_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    }
    Ok(())
}

/// Bumps the modification time of an existing entry without rewriting it
pub fn touch(path: &Path) -> bool {
    let result = File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %StoreError::io(path, e), "cache touch failed");
            false
        }
    }
}

#[cfg(unix)]
fn ensure_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if dir.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(dir)
}

#[cfg(not(unix))]
fn ensure_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn set_file_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(FILE_MODE))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) -> io::Result<()> {
    Ok(())
}
