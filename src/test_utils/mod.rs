//! Test utilities for strata
//!
//! Helpers shared by unit and integration tests: a temporary site with
//! template directories and an isolated cache, plus one-time logging setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata::test_utils::TestEnvironment;
//!
//! # fn example() -> anyhow::Result<()> {
//! let env = TestEnvironment::new()?;
//! let page = env.write_template("Page.ss", "<h1>$Title</h1>")?;
//! let engine = env.engine();
//! # let _ = (page, engine);
//! # Ok(())
//! # }
//! ```

pub mod environment;

pub use environment::TestEnvironment;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=strata=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
