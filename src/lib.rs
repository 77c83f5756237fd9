//! strata - compiled-template cache and layered scope resolution.
//!
//! strata renders a small markup template language into text. Two pieces do the
//! real work:
//!
//! - **The compiled-template cache** ([`cache`], [`templating`]): a template
//!   source file is compiled once into an executable artifact stored under a
//!   deterministic cache key and reused until the source is modified again.
//! - **The scope resolver** ([`scope`]): while an artifact executes, every
//!   variable reference is looked up across overlay data, the current item's
//!   own members, underlay data, iterator-position properties and global
//!   properties, in that order, while the resolver keeps overlay data attached
//!   to the right level of a nested item stack.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use strata::config::EngineConfig;
//! use strata::model::DataObject;
//! use strata::properties::PropertyMap;
//! use strata::templating::TemplateEngine;
//!
//! # fn example() -> anyhow::Result<()> {
//! let engine = TemplateEngine::new(EngineConfig::default());
//! let page = Arc::new(DataObject::from_json(json!({ "Title": "Home" })));
//! let overlay = PropertyMap::new().with_literal("Greeting", "Hello");
//!
//! let html = engine.render("templates/Page.ss".as_ref(), page, overlay, PropertyMap::new())?;
//! println!("{html}");
//! # Ok(())
//! # }
//! ```

// Core functionality modules
pub mod cache;
pub mod config;
pub mod constants;
pub mod core;

// Rendering
pub mod model;
pub mod properties;
pub mod scope;
pub mod templating;

// Supporting modules
pub mod cli;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
