//! `strata show`

use anyhow::Result;
use clap::Args;

use super::common::locate_template;
use crate::templating::TemplateEngine;

#[derive(Args)]
pub struct ShowCommand {
    /// Template path, or a name looked up in the template directories
    template: String,
}

impl ShowCommand {
    pub fn execute(self, engine: &TemplateEngine) -> Result<()> {
        let template = locate_template(engine, &self.template)?;
        print!("{}", engine.artifact_listing(&template)?);
        Ok(())
    }
}
