//! TOML parsing with file context.

use anyhow::{Context, Result};
use std::path::Path;

/// Read and deserialize a TOML configuration file.
///
/// # Errors
///
/// Fails with "Failed to read config file" when the file cannot be read and
/// "Failed to parse config file" when the TOML is invalid or does not match
/// `T`. The underlying error is kept as the cause.
pub fn parse_config<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: T = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}
