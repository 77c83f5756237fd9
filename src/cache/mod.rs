//! Compiled-template cache.
//!
//! A template source file is compiled once into an artifact and the artifact is
//! stored under a deterministic [`CacheKey`]. Later renders reuse the stored
//! artifact for as long as it is at least as new as its source.
//!
//! # Cache Directory Structure
//!
//! ```text
//! {cache_root}/.strata-template-cache/
//! ├── templates.Page.ss.3f1c0a9b2d4e-artifact.json
//! ├── templates.Includes.Nav.ss.81be07d1c6aa-artifact.json
//! └── .locks/                     # only with compile locking enabled
//!     └── templates.Page.ss.3f1c0a9b2d4e-artifact.json.lock
//! ```
//!
//! # Freshness
//!
//! An entry is fresh when the artifact's modification time is greater than or
//! equal to the source's. A stale or missing entry is recompiled
//! unconditionally; there is no content comparison.
//!
//! # Concurrency
//!
//! Every artifact write is atomic (temporary file in the cache directory, then
//! rename), so a concurrent reader sees either the old or the new artifact and
//! never a partial one. By default nothing is held across the
//! check-compile-write sequence: two first renders of the same template may
//! both compile, and the last writer wins. With compile locking enabled an
//! exclusive [`CompileLock`] per key is held across that sequence and freshness
//! is re-checked after acquiring it, so each stale entry is compiled once.
//!
//! # Modules
//!
//! - [`blocks`] - partial-cache-block store used by `<% cached %>` sections
//! - [`flush`] - once-per-request flush flags
//! - [`lock`] - per-key compile locks

pub mod blocks;
pub mod flush;
pub mod lock;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use crate::constants::{CACHE_KEY_DIGEST_LEN, CACHE_KEY_SUFFIX, TEMPLATE_CACHE_DIR};
use crate::core::{Result, StrataError};
use crate::templating::TemplateCompiler;
use crate::utils::fs as fsutil;

pub use blocks::{CacheBlockStore, MemoryCacheBlockStore};
pub use flush::FlushState;
pub use lock::CompileLock;

/// Deterministic name of a template's cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `template` relative to `base_path`.
    ///
    /// The relative path has `\`, `/` and `:` replaced by `.`, followed by a
    /// digest of the relative path itself and the fixed suffix. The digest keeps
    /// keys distinct for paths that normalize to the same text
    /// (`a/b.ss` and `a.b.ss`). A template outside `base_path` is keyed by its
    /// full path.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::path::Path;
    /// use strata::cache::CacheKey;
    ///
    /// let key = CacheKey::for_template(Path::new("/site/templates/Page.ss"), Path::new("/site"));
    /// assert!(key.as_str().starts_with("templates.Page.ss."));
    /// assert!(key.as_str().ends_with("-artifact.json"));
    /// ```
    pub fn for_template(template: &Path, base_path: &Path) -> Self {
        let relative = template.strip_prefix(base_path).unwrap_or(template);
        let relative = relative.to_string_lossy();

        let normalized: String = relative
            .chars()
            .map(|c| match c {
                '\\' | '/' | ':' => '.',
                other => other,
            })
            .collect();

        let digest = hex::encode(Sha256::digest(relative.as_bytes()));
        let short = &digest[..CACHE_KEY_DIGEST_LEN];

        Self(format!("{normalized}.{short}{CACHE_KEY_SUFFIX}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ready-to-execute cache entry.
#[derive(Debug, Clone)]
pub struct CompiledEntry {
    pub key: CacheKey,
    /// Location of the stored artifact
    pub path: PathBuf,
    /// Artifact text as produced by the compiler
    pub artifact: String,
    /// Whether this call compiled the template
    pub recompiled: bool,
}

/// On-disk store of compiled artifacts.
#[derive(Debug, Clone)]
pub struct TemplateCache {
    dir: PathBuf,
    base_path: PathBuf,
    compile_lock: bool,
}

impl TemplateCache {
    /// Cache rooted at `{cache_root}/.strata-template-cache`, keying templates
    /// relative to `base_path`.
    pub fn new(cache_root: impl AsRef<Path>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            dir: cache_root.as_ref().join(TEMPLATE_CACHE_DIR),
            base_path: base_path.into(),
            compile_lock: false,
        }
    }

    /// Hold a per-key lock across check, compile and write.
    pub fn with_compile_lock(mut self, enabled: bool) -> Self {
        self.compile_lock = enabled;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn key_for(&self, template: &Path) -> CacheKey {
        CacheKey::for_template(template, &self.base_path)
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    /// Whether the entry at `entry` is at least as new as `source_modified`.
    ///
    /// A missing or unreadable entry is never fresh.
    pub fn is_fresh(&self, entry: &Path, source_modified: SystemTime) -> bool {
        fsutil::get_modified_time(entry).is_ok_and(|stored| stored >= source_modified)
    }

    /// Return the artifact for `template`, compiling it first when the cache
    /// entry is missing or older than the source.
    ///
    /// # Errors
    ///
    /// - [`StrataError::SourceUnavailable`] if the source cannot be stat'ed or read
    /// - [`StrataError::CompileError`] as reported by the compiler
    /// - [`StrataError::CacheWriteError`] if the artifact cannot be stored
    pub fn ensure_compiled(
        &self,
        template: &Path,
        name: &str,
        debug_comments: bool,
        compiler: &dyn TemplateCompiler,
    ) -> Result<CompiledEntry> {
        let key = self.key_for(template);
        let path = self.entry_path(&key);

        let source_modified = source_mtime(template)?;

        if let Some(artifact) = self.read_fresh(&path, source_modified) {
            tracing::debug!("Template cache hit for {name} ({key})");
            return Ok(CompiledEntry {
                key,
                path,
                artifact,
                recompiled: false,
            });
        }

        let _lock = if self.compile_lock {
            let lock = CompileLock::acquire(&self.dir, &key)?;
            // Another process may have compiled while we waited
            if let Some(artifact) = self.read_fresh(&path, source_modified) {
                tracing::debug!("Template {name} compiled concurrently, reusing ({key})");
                return Ok(CompiledEntry {
                    key,
                    path,
                    artifact,
                    recompiled: false,
                });
            }
            Some(lock)
        } else {
            None
        };

        tracing::debug!("Template cache miss for {name}, compiling ({key})");

        let source = std::fs::read_to_string(template)
            .map_err(|e| StrataError::source_unavailable(template, &e))?;
        let artifact = compiler.compile(&source, name, debug_comments)?;

        fsutil::atomic_write(&path, artifact.as_bytes())
            .map_err(|e| StrataError::cache_write(&path, format!("{e:#}")))?;

        Ok(CompiledEntry {
            key,
            path,
            artifact,
            recompiled: true,
        })
    }

    fn read_fresh(&self, path: &Path, source_modified: SystemTime) -> Option<String> {
        if !self.is_fresh(path, source_modified) {
            return None;
        }
        // A flush may remove the entry between the check and the read
        std::fs::read_to_string(path).ok()
    }

    /// Read the stored artifact for `template` without compiling.
    pub fn stored_artifact(&self, template: &Path) -> Option<String> {
        let path = self.entry_path(&self.key_for(template));
        std::fs::read_to_string(path).ok()
    }

    /// Delete the whole cache directory. A missing directory is not an error.
    ///
    /// Returns whether anything was removed.
    pub fn flush(&self) -> Result<bool> {
        let removed = fsutil::remove_dir_if_exists(&self.dir)
            .map_err(|e| StrataError::cache_write(&self.dir, format!("{e:#}")))?;
        if removed {
            tracing::info!("Flushed template cache at {}", self.dir.display());
        }
        Ok(removed)
    }
}

fn source_mtime(template: &Path) -> Result<SystemTime> {
    let metadata =
        std::fs::metadata(template).map_err(|e| StrataError::source_unavailable(template, &e))?;
    metadata.modified().map_err(|e| StrataError::source_unavailable(template, &e))
}
