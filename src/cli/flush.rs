//! `strata flush`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::templating::TemplateEngine;

#[derive(Args)]
pub struct FlushCommand {
    /// Flush only the compiled-template cache
    #[arg(long)]
    templates: bool,

    /// Flush only the partial cache blocks
    #[arg(long)]
    blocks: bool,

    /// Flush even if already flushed in this request
    #[arg(long)]
    force: bool,
}

impl FlushCommand {
    pub fn execute(self, engine: &TemplateEngine) -> Result<()> {
        // Neither flag means both caches
        let both = !self.templates && !self.blocks;

        if self.templates || both {
            if engine.flush_template_cache(self.force)? {
                println!("{} Flushed template cache at {}", "✓".green(), engine.cache().cache_dir().display());
            } else {
                println!("{} Template cache already flushed", "-".dimmed());
            }
        }

        if (self.blocks || both) && engine.flush_cacheblock_cache(self.force) {
            println!("{} Flushed partial cache blocks", "✓".green());
        }

        Ok(())
    }
}
