//! `strata key`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::locate_template;
use crate::templating::TemplateEngine;

#[derive(Args)]
pub struct KeyCommand {
    /// Template path, or a name looked up in the template directories
    template: String,
}

impl KeyCommand {
    pub fn execute(self, engine: &TemplateEngine) -> Result<()> {
        let template = locate_template(engine, &self.template)?;
        let key = engine.cache_key(&template);
        let entry = engine.cache().entry_path(&key);

        println!("{}", key.as_str().bold());
        println!("  template: {}", engine.template_name(&template));
        println!("  entry:    {}", entry.display());
        println!("  cached:   {}", if entry.exists() { "yes".green() } else { "no".yellow() });
        Ok(())
    }
}
