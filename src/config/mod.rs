//! Engine configuration.
//!
//! [`EngineConfig`] is read from a TOML file (by default `strata.toml` in the
//! working directory). Every field is optional; a missing file yields the
//! defaults. Two environment variables override the file:
//!
//! - `STRATA_ENV` - `dev`, `test` or `live`
//! - `STRATA_CACHE_DIR` - root directory for the template cache
//!
//! ```toml
//! base_path = "."
//! template_dirs = ["templates", "themes/simple/templates"]
//! extension = "ss"
//! environment = "dev"
//! source_file_comments = true
//! default_cast = "Text"
//! duplicate_properties = "reject"
//! compile_lock = true
//! allow_artifact_listing = true
//! ```
//!
//! Relative `base_path` values are resolved against the directory holding the
//! configuration file; relative `template_dirs` and `cache_root` against
//! `base_path`.

pub mod parser;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::{DEFAULT_CAST, DEFAULT_EXTENSION};
use crate::properties::DuplicatePolicy;

pub use parser::parse_config;

/// Environment variable selecting the [`Environment`].
pub const ENV_VAR: &str = "STRATA_ENV";

/// Environment variable overriding [`EngineConfig::cache_root`].
pub const CACHE_DIR_VAR: &str = "STRATA_CACHE_DIR";

/// Deployment environment the engine runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Test,
    #[default]
    Live,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            "live" | "production" => Ok(Self::Live),
            other => Err(anyhow::anyhow!("Unknown environment '{other}' (expected dev, test or live)")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Live => "live",
        };
        f.write_str(name)
    }
}

/// Settings for a [`TemplateEngine`](crate::templating::TemplateEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root that cache keys are computed relative to.
    pub base_path: PathBuf,
    /// Directories searched for included templates, in order.
    pub template_dirs: Vec<PathBuf>,
    /// Template file extension, without the dot.
    pub extension: String,
    /// Directory holding the template cache directory.
    pub cache_root: PathBuf,
    pub environment: Environment,
    /// Emit template boundary comments (development only).
    pub source_file_comments: bool,
    /// Cast type for injected values that declare none.
    pub default_cast: String,
    pub duplicate_properties: DuplicatePolicy,
    /// Serialize compilation of each cache entry with a file lock.
    pub compile_lock: bool,
    /// Permit dumping compiled artifacts.
    pub allow_artifact_listing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            template_dirs: vec![PathBuf::from("templates")],
            extension: DEFAULT_EXTENSION.to_string(),
            cache_root: std::env::temp_dir(),
            environment: Environment::default(),
            source_file_comments: false,
            default_cast: DEFAULT_CAST.to_string(),
            duplicate_properties: DuplicatePolicy::default(),
            compile_lock: false,
            allow_artifact_listing: false,
        }
    }
}

impl EngineConfig {
    /// Defaults rooted at `base_path`.
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `path` and apply environment overrides.
    ///
    /// A missing file yields the defaults (with overrides applied).
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed, or if
    /// `STRATA_ENV` holds an unknown environment name.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let mut config: Self = parse_config(path)?;
            if config.base_path.is_relative() {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                config.base_path = dir.join(&config.base_path);
            }
            tracing::debug!("Loaded engine configuration from {}", path.display());
            config
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `STRATA_ENV` and `STRATA_CACHE_DIR` when set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(env) = std::env::var(ENV_VAR) {
            self.environment = env.parse().with_context(|| format!("Invalid {ENV_VAR} value"))?;
        }
        if let Ok(dir) = std::env::var(CACHE_DIR_VAR)
            && !dir.is_empty()
        {
            self.cache_root = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Whether compiled templates carry boundary comments.
    pub fn include_debug_comments(&self) -> bool {
        self.environment == Environment::Dev && self.source_file_comments
    }

    /// Template directories with relative entries resolved against `base_path`.
    pub fn resolved_template_dirs(&self) -> Vec<PathBuf> {
        self.template_dirs.iter().map(|dir| self.resolve(dir)).collect()
    }

    /// Cache root, resolved against `base_path` when relative.
    pub fn resolved_cache_root(&self) -> PathBuf {
        self.resolve(&self.cache_root)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}
