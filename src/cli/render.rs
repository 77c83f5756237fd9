//! `strata render`

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use super::common::{locate_template, parse_assignments};
use crate::model::{DataObject, Item};
use crate::utils::read_text_file;
use crate::templating::TemplateEngine;

#[derive(Args)]
pub struct RenderCommand {
    /// Template path, or a name looked up in the template directories
    template: String,

    /// JSON file holding the root item's fields
    #[arg(long)]
    data: Option<PathBuf>,

    /// Overlay value, checked before the item's own fields (repeatable)
    #[arg(long = "overlay", value_name = "KEY=VALUE")]
    overlay: Vec<String>,

    /// Underlay value, checked after the item's own fields (repeatable)
    #[arg(long = "underlay", value_name = "KEY=VALUE")]
    underlay: Vec<String>,
}

impl RenderCommand {
    pub fn execute(self, engine: &TemplateEngine) -> Result<()> {
        let output = self.render(engine)?;
        print!("{output}");
        Ok(())
    }

    pub fn render(&self, engine: &TemplateEngine) -> Result<String> {
        let template = locate_template(engine, &self.template)?;
        let item = self.load_item()?;
        let overlay = parse_assignments(&self.overlay)?;
        let underlay = parse_assignments(&self.underlay)?;

        Ok(engine.render(&template, item, overlay, underlay)?)
    }

    fn load_item(&self) -> Result<Item> {
        let Some(path) = &self.data else {
            return Ok(Arc::new(DataObject::new()));
        };

        let text = read_text_file(path)?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse data file {}", path.display()))?;
        if !value.is_object() {
            anyhow::bail!("Data file {} must hold a JSON object", path.display());
        }
        Ok(Arc::new(DataObject::from_json(value)))
    }
}
