//! File system helpers shared by the template cache and the CLI.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata::utils::{atomic_write, ensure_dir};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new("cache/templates"))?;
//! atomic_write(Path::new("cache/templates/page-artifact.json"), b"{}")?;
//! # Ok(())
//! # }
//! ```

pub mod fs;

pub use fs::{atomic_write, ensure_dir, get_modified_time, read_text_file, remove_dir_if_exists};
