//! Per-key compile locks.
//!
//! A [`CompileLock`] is an exclusive OS file lock on
//! `{cache_dir}/.locks/{key}.lock`. It serializes compilation of one cache
//! entry across threads and processes; different keys never contend. The lock
//! is released when the value is dropped.

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::CacheKey;
use crate::constants::LOCKS_DIR;
use crate::core::{Result, StrataError};

/// An exclusive lock on one cache key.
pub struct CompileLock {
    file: File,
    path: PathBuf,
}

impl CompileLock {
    /// Acquire the lock for `key`, blocking until it is available.
    ///
    /// Creates the `.locks/` directory when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::CacheWriteError`] if the lock file cannot be
    /// created or locked.
    pub fn acquire(cache_dir: &Path, key: &CacheKey) -> Result<Self> {
        let locks_dir = cache_dir.join(LOCKS_DIR);
        std::fs::create_dir_all(&locks_dir).map_err(|e| {
            let reason = if e.kind() == std::io::ErrorKind::PermissionDenied {
                format!("permission denied creating locks directory: {e}")
            } else {
                e.to_string()
            };
            StrataError::cache_write(&locks_dir, reason)
        })?;

        let path = locks_dir.join(format!("{key}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| StrataError::cache_write(&path, format!("failed to open lock file: {e}")))?;

        file.lock_exclusive()
            .map_err(|e| StrataError::cache_write(&path, format!("failed to acquire lock: {e}")))?;

        tracing::trace!("Acquired compile lock {}", path.display());
        Ok(Self {
            file,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CompileLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn key(name: &str) -> CacheKey {
        CacheKey::for_template(Path::new(name), Path::new(""))
    }

    #[test]
    fn test_lock_creates_lock_file() {
        let temp = TempDir::new().unwrap();
        let lock = CompileLock::acquire(temp.path(), &key("Page.ss")).unwrap();

        assert!(lock.path().exists());
        assert!(lock.path().starts_with(temp.path().join(LOCKS_DIR)));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let first = CompileLock::acquire(temp.path(), &key("Page.ss")).unwrap();
        drop(first);

        // Would block forever if the first lock were still held
        let _second = CompileLock::acquire(temp.path(), &key("Page.ss")).unwrap();
    }

    #[test]
    fn test_same_key_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_path_buf();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dir = dir.clone();
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let _lock = CompileLock::acquire(&dir, &key("Page.ss")).unwrap();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_different_keys_do_not_contend() {
        let temp = TempDir::new().unwrap();
        let _a = CompileLock::acquire(temp.path(), &key("A.ss")).unwrap();
        let _b = CompileLock::acquire(temp.path(), &key("B.ss")).unwrap();
    }
}
