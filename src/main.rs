//! strata CLI entry point
//!
//! Parses arguments, installs logging, runs the command and prints
//! user-friendly errors.

use anyhow::Result;
use clap::Parser;
use strata::cli::{Cli, Verbosity};
use strata::core::user_friendly_error;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    init_logging(cli.verbosity());

    match cli.execute() {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}

fn init_logging(verbosity: Verbosity) {
    let filter = match verbosity {
        Verbosity::Verbose => EnvFilter::new("debug"),
        Verbosity::Quiet => EnvFilter::new("off"),
        Verbosity::Normal => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}
