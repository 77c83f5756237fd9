//! Constants shared across the crate.
//!
//! Cache layout names and defaults live here so the cache, the engine and the
//! CLI agree on them.

/// Directory under the cache root holding compiled artifacts.
pub const TEMPLATE_CACHE_DIR: &str = ".strata-template-cache";

/// Fixed suffix appended to every cache key.
pub const CACHE_KEY_SUFFIX: &str = "-artifact.json";

/// Number of hex digits of the path digest carried in a cache key.
pub const CACHE_KEY_DIGEST_LEN: usize = 12;

/// Subdirectory of the template cache holding per-key compile locks.
pub const LOCKS_DIR: &str = ".locks";

/// Cast type used when a property source declares none.
pub const DEFAULT_CAST: &str = "Text";

/// Default template file extension.
pub const DEFAULT_EXTENSION: &str = "ss";

/// Subdirectory searched first when resolving an include.
pub const INCLUDES_DIR: &str = "Includes";

/// Default configuration file name looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "strata.toml";
