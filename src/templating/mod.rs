//! Template rendering.
//!
//! [`TemplateEngine`] ties the pipeline together: it finds the compiled artifact
//! for a template source through the [`TemplateCache`], compiling it when the
//! stored entry is missing or stale, and executes the artifact with a fresh
//! [`ScopeResolver`] wrapping the root item.
//!
//! # Rendering a template
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use strata::config::EngineConfig;
//! use strata::model::{DataObject, Item};
//! use strata::properties::PropertyMap;
//! use strata::templating::TemplateEngine;
//!
//! # fn example() -> strata::core::Result<()> {
//! let engine = TemplateEngine::new(EngineConfig::with_base_path("/srv/site"));
//! engine.begin_request();
//!
//! let page: Item = Arc::new(DataObject::from_json(json!({ "Title": "Home" })));
//! let overlay = PropertyMap::new().with_literal("Greeting", "Hello");
//! let html = engine.render("/srv/site/templates/Page.ss".as_ref(), page, overlay, PropertyMap::new())?;
//! # let _ = html;
//! # Ok(())
//! # }
//! ```
//!
//! # Includes
//!
//! `<% include Name %>` looks for `Includes/Name.<ext>` and then `Name.<ext>` in
//! each configured template directory, in order. The included template renders
//! with the including scope's current item, the include arguments as its
//! overlay, an empty underlay, and the including resolver as inherited scope,
//! so loop position properties keep answering for the enclosing loop.
//!
//! # Flushing
//!
//! [`TemplateEngine::flush_template_cache`] and
//! [`TemplateEngine::flush_cacheblock_cache`] run at most once per request
//! (see [`TemplateEngine::begin_request`]) unless forced.

pub mod artifact;
pub mod compiler;
pub mod interpreter;


use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{CacheBlockStore, CacheKey, FlushState, MemoryCacheBlockStore, TemplateCache};
use crate::config::EngineConfig;
use crate::constants::INCLUDES_DIR;
use crate::core::{Result, StrataError};
use crate::model::{CastHook, DefaultCaster, Item};
use crate::properties::{PropertyMap, PropertyRegistries};
use crate::scope::ScopeResolver;

pub use artifact::{Node, Program, numbered_listing};
pub use compiler::{MarkupCompiler, TemplateCompiler};
pub use interpreter::{IncludeRenderer, Interpreter};

/// Maximum include nesting before rendering is aborted.
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Compiles, caches and renders templates.
pub struct TemplateEngine {
    config: EngineConfig,
    cache: TemplateCache,
    template_dirs: Vec<PathBuf>,
    compiler: Arc<dyn TemplateCompiler>,
    registries: Arc<PropertyRegistries>,
    caster: Arc<dyn CastHook>,
    blocks: Arc<dyn CacheBlockStore>,
    flush_state: Arc<FlushState>,
}

impl TemplateEngine {
    /// Engine with the built-in compiler, the standard iterator properties, the
    /// default caster and an in-memory cache-block store.
    pub fn new(config: EngineConfig) -> Self {
        let base_path = canonical_or_self(&config.base_path);
        let cache = TemplateCache::new(config.resolved_cache_root(), base_path)
            .with_compile_lock(config.compile_lock);
        let template_dirs = config.resolved_template_dirs();
        let registries = PropertyRegistries::standard(config.duplicate_properties);

        Self {
            cache,
            template_dirs,
            compiler: Arc::new(MarkupCompiler::new()),
            registries: Arc::new(registries),
            caster: Arc::new(DefaultCaster),
            blocks: Arc::new(MemoryCacheBlockStore::new()),
            flush_state: Arc::new(FlushState::new()),
            config,
        }
    }

    pub fn with_compiler(mut self, compiler: impl TemplateCompiler + 'static) -> Self {
        self.compiler = Arc::new(compiler);
        self
    }

    /// Replace the property registries (iterator and global providers).
    pub fn with_registries(mut self, registries: PropertyRegistries) -> Self {
        self.registries = Arc::new(registries);
        self
    }

    pub fn with_caster(mut self, caster: impl CastHook + 'static) -> Self {
        self.caster = Arc::new(caster);
        self
    }

    pub fn with_block_store(mut self, blocks: Arc<dyn CacheBlockStore>) -> Self {
        self.blocks = blocks;
        self
    }

    /// Share flush flags with other engines in the same process.
    pub fn with_flush_state(mut self, flush_state: Arc<FlushState>) -> Self {
        self.flush_state = flush_state;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn block_store(&self) -> &dyn CacheBlockStore {
        self.blocks.as_ref()
    }

    pub fn flush_state(&self) -> &FlushState {
        &self.flush_state
    }

    /// Name a template is compiled and reported under: its path relative to
    /// the base path, or the full path for templates outside it.
    pub fn template_name(&self, template: &Path) -> String {
        let template = canonical_or_self(template);
        template
            .strip_prefix(self.cache.base_path())
            .unwrap_or(template.as_path())
            .to_string_lossy()
            .into_owned()
    }

    pub fn cache_key(&self, template: &Path) -> CacheKey {
        self.cache.key_for(&canonical_or_self(template))
    }

    /// Render `template` for `item`.
    ///
    /// # Errors
    ///
    /// - [`StrataError::SourceUnavailable`] if the source cannot be read
    /// - [`StrataError::CompileError`] from the compiler
    /// - [`StrataError::CacheWriteError`] if the artifact cannot be stored
    /// - any lookup failure raised while executing, such as
    ///   [`StrataError::InvalidPropertySource`] or [`StrataError::NoParentScope`]
    pub fn render(
        &self,
        template: &Path,
        item: Item,
        overlay: PropertyMap,
        underlay: PropertyMap,
    ) -> Result<String> {
        self.render_with_scope(template, item, overlay, underlay, None)
    }

    /// Render `template`, inheriting iteration state from `inherited`.
    pub fn render_with_scope(
        &self,
        template: &Path,
        item: Item,
        overlay: PropertyMap,
        underlay: PropertyMap,
        inherited: Option<&ScopeResolver>,
    ) -> Result<String> {
        self.render_at_depth(template, item, overlay, underlay, inherited, 0)
    }

    fn render_at_depth(
        &self,
        template: &Path,
        item: Item,
        overlay: PropertyMap,
        underlay: PropertyMap,
        inherited: Option<&ScopeResolver>,
        depth: usize,
    ) -> Result<String> {
        let path = canonical_or_self(template);
        let name = self.template_name(&path);

        if depth > MAX_INCLUDE_DEPTH {
            return Err(StrataError::render(
                name,
                format!("includes nested deeper than {MAX_INCLUDE_DEPTH} levels"),
            ));
        }

        let entry = self.cache.ensure_compiled(
            &path,
            &name,
            self.config.include_debug_comments(),
            self.compiler.as_ref(),
        )?;
        let program = Program::from_artifact(&entry.artifact, &name)?;

        let mut scope = ScopeResolver::new(item, overlay, underlay, inherited)
            .with_registries(Arc::clone(&self.registries))
            .with_caster(Arc::clone(&self.caster), self.config.default_cast.clone());

        let mut output = String::new();
        Interpreter::new(&program, self.blocks.as_ref())
            .with_includes(self, depth)
            .execute(&mut scope, &mut output)?;

        tracing::debug!("Rendered {name} ({} bytes)", output.len());
        Ok(output)
    }

    /// Locate an included template by name.
    pub fn resolve_include(&self, name: &str) -> Result<PathBuf> {
        let file_name = format!("{name}.{}", self.config.extension);
        self.template_dirs
            .iter()
            .flat_map(|dir| [dir.join(INCLUDES_DIR).join(&file_name), dir.join(&file_name)])
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| StrataError::TemplateNotFound {
                name: name.to_string(),
            })
    }

    /// Locate a top-level template given as a path or a name.
    ///
    /// An existing path is used as-is; otherwise `name` and `name.<ext>` are
    /// looked up in each template directory.
    pub fn find_template(&self, name: &str) -> Result<PathBuf> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let with_ext = format!("{name}.{}", self.config.extension);
        self.template_dirs
            .iter()
            .flat_map(|dir| [dir.join(name), dir.join(&with_ext)])
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| StrataError::TemplateNotFound {
                name: name.to_string(),
            })
    }

    /// Start a new logical request, re-arming the once-per-request flushes.
    pub fn begin_request(&self) {
        self.flush_state.begin_request();
    }

    /// Delete the compiled-template cache directory.
    ///
    /// Runs once per request unless `force` is set. Returns whether the flush ran.
    pub fn flush_template_cache(&self, force: bool) -> Result<bool> {
        if !self.flush_state.claim_templates(force) {
            tracing::debug!("Template cache already flushed in this request");
            return Ok(false);
        }
        self.cache.flush()?;
        Ok(true)
    }

    /// Clear the partial-cache-block store.
    ///
    /// Runs once per request unless `force` is set. Returns whether the flush ran.
    pub fn flush_cacheblock_cache(&self, force: bool) -> bool {
        if !self.flush_state.claim_blocks(force) {
            tracing::debug!("Cache blocks already flushed in this request");
            return false;
        }
        self.blocks.clear();
        tracing::info!("Flushed partial cache blocks");
        true
    }

    /// Flush both caches.
    pub fn flush(&self, force: bool) -> Result<()> {
        self.flush_template_cache(force)?;
        self.flush_cacheblock_cache(force);
        Ok(())
    }

    /// Numbered dump of the compiled artifact for `template`, for troubleshooting.
    ///
    /// Compiles the template first when needed. Rendering output is unaffected.
    ///
    /// # Errors
    ///
    /// [`StrataError::PermissionDenied`] unless `allow_artifact_listing` is set.
    pub fn artifact_listing(&self, template: &Path) -> Result<String> {
        if !self.config.allow_artifact_listing {
            return Err(StrataError::PermissionDenied {
                operation: "artifact listing".to_string(),
            });
        }

        let path = canonical_or_self(template);
        let name = self.template_name(&path);
        let entry = self.cache.ensure_compiled(
            &path,
            &name,
            self.config.include_debug_comments(),
            self.compiler.as_ref(),
        )?;

        Ok(format!("Template: {}\n{}", entry.path.display(), numbered_listing(&entry.artifact)))
    }
}

impl IncludeRenderer for TemplateEngine {
    fn render_include(
        &self,
        name: &str,
        item: Item,
        overlay: PropertyMap,
        parent: &ScopeResolver,
        depth: usize,
    ) -> Result<String> {
        let path = self.resolve_include(name)?;
        self.render_at_depth(&path, item, overlay, PropertyMap::new(), Some(parent), depth)
    }
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("cache_dir", &self.cache.cache_dir())
            .field("template_dirs", &self.template_dirs)
            .field("environment", &self.config.environment)
            .field("blocks", &self.blocks)
            .finish()
    }
}

fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
