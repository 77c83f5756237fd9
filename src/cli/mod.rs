//! Command-line interface for strata.
//!
//! # Commands
//!
//! - `render` - render a template against JSON data
//! - `flush` - clear the compiled-template cache and/or partial cache blocks
//! - `show` - print the numbered compiled artifact of a template
//! - `key` - print the cache key and entry path of a template
//!
//! # Global Options
//!
//! - `--config` - path to the engine configuration (default `strata.toml`)
//! - `--verbose` - enable debug logging
//! - `--quiet` - suppress all logging
//!
//! # Example
//!
//! ```bash
//! strata render templates/Page.ss --data page.json --overlay Title=Home
//! strata flush --templates --force
//! STRATA_ENV=dev strata show Page
//! ```

pub mod common;
mod flush;
mod key;
mod render;
mod show;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Verbosity resolved from the global flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Render markup templates through a compiled-template cache",
    version,
    long_about = "strata compiles markup templates once into cached artifacts and renders them \
                  with layered overlay, item, underlay, iterator and global data."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the engine configuration file
    #[arg(short, long, global = true, env = "STRATA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template and print the output
    Render(render::RenderCommand),

    /// Flush the template cache and/or partial cache blocks
    Flush(flush::FlushCommand),

    /// Print the compiled artifact of a template with line numbers
    Show(show::ShowCommand),

    /// Print the cache key a template is stored under
    Key(key::KeyCommand),
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    /// Run the selected command.
    pub fn execute(self) -> Result<()> {
        let engine = common::load_engine(self.config.as_deref())?;
        engine.begin_request();

        match self.command {
            Commands::Render(cmd) => cmd.execute(&engine),
            Commands::Flush(cmd) => cmd.execute(&engine),
            Commands::Show(cmd) => cmd.execute(&engine),
            Commands::Key(cmd) => cmd.execute(&engine),
        }
    }
}
