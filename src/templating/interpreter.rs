//! Executes compiled [`Program`]s.
//!
//! An artifact runs with three bindings: the partial-cache-block store, the
//! active [`ScopeResolver`] and an output buffer. Every lookup goes through the
//! resolver; blocks map onto its scope operations:
//!
//! - `$A.B.C` - `locally()`, `obj("A")`, `obj("B")`, then `xml_val("C")`
//! - `<% if $A.B %>` - the same chain ending in `has_value("B")`
//! - `<% loop $A %>` - `locally()`, `obj("A")`, `push_scope()`, `next()` until
//!   exhausted, `pop_scope()`
//! - `<% with $A %>` - `locally()`, `obj("A")`, `push_scope()`, body, `pop_scope()`
//!
//! Includes are delegated to an [`IncludeRenderer`], normally the engine.

use std::sync::Arc;

use super::artifact::{Argument, Condition, IncludeArg, Lookup, Node, Program};
use crate::cache::CacheBlockStore;
use crate::core::{Result, StrataError};
use crate::model::{DataObject, Item, Value, json_text};
use crate::properties::{PropertyMap, SourceEntry};
use crate::scope::ScopeResolver;

/// Renders `<% include %>` targets.
pub trait IncludeRenderer {
    /// Render template `name` for `item` with `overlay` as its overlay, inheriting
    /// the position state of `parent`. `depth` is the nesting level of the include.
    fn render_include(
        &self,
        name: &str,
        item: Item,
        overlay: PropertyMap,
        parent: &ScopeResolver,
        depth: usize,
    ) -> Result<String>;
}

/// A lookup step with its arguments evaluated.
type PreparedStep<'p> = (&'p str, Vec<serde_json::Value>);

/// Interpreter for one program.
pub struct Interpreter<'a> {
    program: &'a Program,
    blocks: &'a dyn CacheBlockStore,
    includes: Option<&'a dyn IncludeRenderer>,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a Program, blocks: &'a dyn CacheBlockStore) -> Self {
        Self {
            program,
            blocks,
            includes: None,
            depth: 0,
        }
    }

    /// Enable `<% include %>`, rendering at nesting level `depth`.
    pub fn with_includes(mut self, includes: &'a dyn IncludeRenderer, depth: usize) -> Self {
        self.includes = Some(includes);
        self.depth = depth;
        self
    }

    /// Run the program, appending its output to `output`.
    pub fn execute(&self, scope: &mut ScopeResolver, output: &mut String) -> Result<()> {
        self.run(&self.program.nodes, scope, output)
    }

    fn run(&self, nodes: &[Node], scope: &mut ScopeResolver, out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text {
                    text,
                } => out.push_str(text),
                Node::Value {
                    path,
                } => {
                    let text = self.render_lookup(path, scope)?;
                    out.push_str(&text);
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = None;
                    for branch in branches {
                        if self.test(&branch.condition, scope)? {
                            taken = Some(&branch.body);
                            break;
                        }
                    }
                    self.run(taken.unwrap_or(otherwise), scope, out)?;
                }
                Node::Loop {
                    path,
                    body,
                } => {
                    self.enter(path, scope)?;
                    scope.push_scope();
                    while scope.next().is_some() {
                        self.run(body, scope, out)?;
                    }
                    scope.pop_scope();
                }
                Node::With {
                    path,
                    body,
                } => {
                    self.enter(path, scope)?;
                    scope.push_scope();
                    self.run(body, scope, out)?;
                    scope.pop_scope();
                }
                Node::Include {
                    template,
                    args,
                } => {
                    let text = self.include(template, args, scope)?;
                    out.push_str(&text);
                }
                Node::Cached {
                    index,
                    key,
                    body,
                } => self.cached(*index, key, body, scope, out)?,
            }
        }
        Ok(())
    }

    fn prepare<'p>(&self, lookup: &'p Lookup, scope: &mut ScopeResolver) -> Result<Vec<PreparedStep<'p>>> {
        lookup
            .steps
            .iter()
            .map(|step| {
                let args = step
                    .args
                    .iter()
                    .map(|arg| self.argument_value(arg, scope))
                    .collect::<Result<Vec<_>>>()?;
                Ok((step.name.as_str(), args))
            })
            .collect()
    }

    /// Walk every step of `lookup` from the local scope.
    fn enter(&self, lookup: &Lookup, scope: &mut ScopeResolver) -> Result<()> {
        let steps = self.prepare(lookup, scope)?;
        scope.locally();
        for (name, args) in &steps {
            scope.obj(name, args)?;
        }
        Ok(())
    }

    /// Walk all but the last step, returning the last one.
    fn enter_parent<'p>(&self, lookup: &'p Lookup, scope: &mut ScopeResolver) -> Result<Option<PreparedStep<'p>>> {
        let mut steps = self.prepare(lookup, scope)?;
        let last = steps.pop();
        scope.locally();
        for (name, args) in &steps {
            scope.obj(name, args)?;
        }
        Ok(last)
    }

    fn render_lookup(&self, lookup: &Lookup, scope: &mut ScopeResolver) -> Result<String> {
        match self.enter_parent(lookup, scope)? {
            Some((name, args)) if is_navigation(name) => {
                scope.obj(name, &args)?;
                Ok(scope.self_item().map(|item| item.for_template()).unwrap_or_default())
            }
            Some((name, args)) => scope.xml_val(name, &args),
            None => Ok(scope.self_item().map(|item| item.for_template()).unwrap_or_default()),
        }
    }

    fn test(&self, condition: &Condition, scope: &mut ScopeResolver) -> Result<bool> {
        let result = match self.enter_parent(&condition.path, scope)? {
            Some((name, args)) if is_navigation(name) => {
                scope.obj(name, &args)?;
                scope.self_item().is_some_and(|item| item.exists())
            }
            Some((name, args)) => scope.has_value(name, &args)?,
            None => scope.self_item().is_some_and(|item| item.exists()),
        };
        Ok(result != condition.negated)
    }

    /// The item a lookup ends on, for passing objects into includes.
    fn lookup_item(&self, lookup: &Lookup, scope: &mut ScopeResolver) -> Result<Option<Item>> {
        self.enter(lookup, scope)?;
        Ok(scope.self_item())
    }

    /// Unescaped text of an argument, used for call arguments and cache keys.
    fn argument_value(&self, argument: &Argument, scope: &mut ScopeResolver) -> Result<serde_json::Value> {
        match argument {
            Argument::Literal(value) => Ok(value.clone()),
            Argument::Lookup(lookup) => {
                let text = self.lookup_item(lookup, scope)?.map(|item| raw_text(&item)).unwrap_or_default();
                Ok(serde_json::Value::String(text))
            }
        }
    }

    fn include(&self, template: &str, args: &[IncludeArg], scope: &mut ScopeResolver) -> Result<String> {
        let Some(includes) = self.includes else {
            return Err(StrataError::render(
                &self.program.template,
                format!("cannot include '{template}': includes are not available"),
            ));
        };

        let mut overlay = PropertyMap::new();
        for arg in args {
            match &arg.value {
                Argument::Literal(value) => overlay.insert(
                    arg.name.clone(),
                    SourceEntry::literal(value.clone()),
                ),
                Argument::Lookup(lookup) => {
                    if let Some(item) = self.lookup_item(lookup, scope)? {
                        overlay.insert(
                            arg.name.clone(),
                            SourceEntry::literal(Value::Object(item)),
                        );
                    }
                }
            }
        }

        let item = scope.current_item().unwrap_or_else(|| Arc::new(DataObject::new()) as Item);
        tracing::trace!("Including {template} from {}", self.program.template);
        includes.render_include(template, item, overlay, scope, self.depth + 1)
    }

    fn cached(
        &self,
        index: usize,
        key: &[Argument],
        body: &[Node],
        scope: &mut ScopeResolver,
        out: &mut String,
    ) -> Result<()> {
        let mut block_key = format!("{}#{index}", self.program.template);
        for part in key {
            let value = self.argument_value(part, scope)?;
            block_key.push('|');
            block_key.push_str(&json_text(&value));
        }

        if let Some(hit) = self.blocks.get(&block_key) {
            tracing::trace!("Cache block hit: {block_key}");
            out.push_str(&hit);
            return Ok(());
        }

        let mut rendered = String::new();
        self.run(body, scope, &mut rendered)?;
        self.blocks.set(&block_key, rendered.clone());
        out.push_str(&rendered);
        Ok(())
    }
}

fn is_navigation(name: &str) -> bool {
    matches!(name, "Up" | "Top" | "Me")
}

fn raw_text(item: &Item) -> String {
    match item.obj("RAW", &[]) {
        Some(raw) => raw.for_template(),
        None => item.for_template(),
    }
}
