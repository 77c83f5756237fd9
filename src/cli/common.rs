//! Helpers shared by CLI commands

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::constants::CONFIG_FILE_NAME;
use crate::properties::PropertyMap;
use crate::templating::TemplateEngine;

/// Build an engine from the configuration at `config_path`, or from
/// `strata.toml` in the current directory.
pub fn load_engine(config_path: Option<&Path>) -> Result<TemplateEngine> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()
            .context("Failed to determine current directory")?
            .join(CONFIG_FILE_NAME),
    };

    let config = EngineConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::debug!("Engine environment: {}", config.environment);

    Ok(TemplateEngine::new(config))
}

/// Locate a template given on the command line as a path or a name.
pub fn locate_template(engine: &TemplateEngine, template: &str) -> Result<PathBuf> {
    Ok(engine.find_template(template)?)
}

/// Parse `KEY=VALUE` pairs into literal entries.
///
/// Values that parse as JSON (numbers, booleans, quoted strings) keep their
/// type; anything else, `null` included, is taken as a plain string.
pub fn parse_assignments(pairs: &[String]) -> Result<PropertyMap> {
    let mut map = PropertyMap::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("Expected KEY=VALUE, got '{pair}'");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("Missing property name in '{pair}'");
        }
        // `null` stays text
        let value = match serde_json::from_str::<serde_json::Value>(value) {
            Ok(parsed) if !parsed.is_null() => parsed,
            _ => serde_json::Value::String(value.to_string()),
        };
        map = map.with_literal(name, value);
    }
    Ok(map)
}
