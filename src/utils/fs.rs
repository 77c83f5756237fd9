//! File system operations with atomic writes.
//!
//! Writers never leave a partially written file behind: content goes to a
//! uniquely named temporary file in the destination directory, is synced, and
//! is then renamed over the destination. Concurrent writers of the same path
//! therefore race only on which complete file ends up in place.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

/// Ensures a directory exists, creating it and its parents if needed.
///
/// # Errors
///
/// Fails if the path exists but is not a directory, or if creation fails.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Atomically writes bytes to a file.
///
/// The parent directory is created when missing. The temporary file is created
/// with [`tempfile::NamedTempFile::new_in`] next to the destination so the final
/// rename never crosses a file system boundary.
///
/// # Errors
///
/// Fails if the directory cannot be created, the temporary file cannot be
/// written or synced, or the rename fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in: {}", parent.display()))?;

    temp.write_all(content)
        .with_context(|| format!("Failed to write to temp file: {}", temp.path().display()))?;
    temp.as_file().sync_all().context("Failed to sync file to disk")?;

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Reads a UTF-8 text file.
pub fn read_text_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Gets the modification time of a file.
///
/// # Errors
///
/// Returns an error if the file metadata cannot be read.
pub fn get_modified_time(path: &Path) -> Result<SystemTime> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to get metadata for: {}", path.display()))?;

    metadata
        .modified()
        .with_context(|| format!("Failed to get modification time for: {}", path.display()))
}

/// Removes a directory tree. A missing directory is not an error.
///
/// Returns whether anything was removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove directory: {}", path.display())),
    }
}
