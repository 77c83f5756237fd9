//! Temporary template site for tests.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use crate::config::EngineConfig;
use crate::templating::TemplateEngine;

/// A throwaway site: `site/templates` for sources and `cache` for artifacts.
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub site_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub cache_root: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let site_dir = temp_dir.path().join("site");
        let templates_dir = site_dir.join("templates");
        let cache_root = temp_dir.path().join("cache");

        fs::create_dir_all(&templates_dir)?;
        fs::create_dir_all(&cache_root)?;

        Ok(Self {
            temp_dir,
            site_dir,
            templates_dir,
            cache_root,
        })
    }

    /// Write a template below the templates directory, creating parents.
    pub fn write_template(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.templates_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Rewrite a template and push its modification time forward so it reads
    /// as newer than any artifact compiled from the previous content.
    pub fn update_template(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.write_template(relative, content)?;
        touch_later(&path, Duration::from_secs(60))?;
        Ok(path)
    }

    /// Configuration rooted at the site, caching into the environment's cache root.
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            cache_root: self.cache_root.clone(),
            ..EngineConfig::with_base_path(self.site_dir.clone())
        }
    }

    pub fn engine(&self) -> TemplateEngine {
        TemplateEngine::new(self.config())
    }

    pub fn engine_with(&self, configure: impl FnOnce(&mut EngineConfig)) -> TemplateEngine {
        let mut config = self.config();
        configure(&mut config);
        TemplateEngine::new(config)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Set a file's modification time `by` past now.
pub fn touch_later(path: &Path, by: Duration) -> Result<()> {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.set_modified(SystemTime::now() + by)
        .with_context(|| format!("Failed to set mtime on {}", path.display()))?;
    Ok(())
}
