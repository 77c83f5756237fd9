//! Layered variable resolution on top of a [`ScopeStack`].
//!
//! For every property name the resolver searches, first match wins:
//!
//! 1. **Overlay** - per-render data with the highest precedence (include
//!    arguments). Lazy entries are evaluated now; a lazy entry producing no
//!    value does not match and the search continues.
//! 2. **The current item** - if the item (or the current loop element) has a
//!    field or method with this name, the search stops *without* an injected
//!    value and the caller uses the item's own member.
//! 3. **Underlay** - per-render data below the item (content slots).
//! 4. **Iterator-position properties**, evaluated at the current loop
//!    position, or `(0, 1)` outside a loop.
//! 5. **Global properties**.
//!
//! # Overlay relocation
//!
//! The overlay belongs to the scope it was supplied for, not to blocks nested
//! inside it. [`ScopeResolver::push_scope`] therefore parks the live overlay on
//! the frame the block was opened from and starts the block with an empty
//! overlay; [`ScopeResolver::pop_scope`] restores it from that same frame.
//! `$Up` and `$Top` recover a parked overlay when the live one is empty, so
//! `$Up.Title` inside a loop still sees the include arguments of the
//! enclosing scope.

use std::sync::Arc;

use super::stack::ScopeStack;
use crate::core::{Result, StrataError};
use crate::model::{CastHook, DefaultCaster, Item, Value};
use crate::properties::registry::IteratorEntry;
use crate::properties::{IteratorPosition, LazyFn, PropertyMap, PropertyRegistries, PropertySource};

/// Which layer supplied an injected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Overlay,
    Underlay,
    Iterator,
    Global,
}

/// Result of a successful injected lookup.
#[derive(Debug, Clone)]
pub struct InjectedValue {
    pub layer: Layer,
    /// The raw value as produced by the source
    pub value: Value,
    /// The cast object, present when the lookup asked for casting
    pub obj: Option<Item>,
}

enum SourceValue {
    Ready(Value),
    Call(LazyFn),
    Iterator(IteratorEntry, IteratorPosition),
}

struct ValueSource {
    layer: Layer,
    value: SourceValue,
    casting: Option<String>,
}

/// Scope stack decorated with overlay, underlay, iterator and global layers.
#[derive(Clone)]
pub struct ScopeResolver {
    stack: ScopeStack,
    overlay: PropertyMap,
    underlay: PropertyMap,
    registries: Arc<PropertyRegistries>,
    caster: Arc<dyn CastHook>,
    default_cast: String,
}

impl ScopeResolver {
    /// Create a resolver for `item`.
    ///
    /// An inherited resolver (the scope an include is rendered from) passes on
    /// its loop position, registries and cast settings.
    pub fn new(
        item: Item,
        overlay: PropertyMap,
        underlay: PropertyMap,
        inherited: Option<&ScopeResolver>,
    ) -> Self {
        let stack = ScopeStack::new(item, inherited.map(|parent| &parent.stack));
        let (registries, caster, default_cast) = match inherited {
            Some(parent) => (
                Arc::clone(&parent.registries),
                Arc::clone(&parent.caster),
                parent.default_cast.clone(),
            ),
            None => (
                Arc::new(PropertyRegistries::default()),
                Arc::new(DefaultCaster) as Arc<dyn CastHook>,
                crate::constants::DEFAULT_CAST.to_string(),
            ),
        };

        Self {
            stack,
            overlay,
            underlay,
            registries,
            caster,
            default_cast,
        }
    }

    pub fn with_registries(mut self, registries: Arc<PropertyRegistries>) -> Self {
        self.registries = registries;
        self
    }

    pub fn with_caster(mut self, caster: Arc<dyn CastHook>, default_cast: impl Into<String>) -> Self {
        self.caster = caster;
        self.default_cast = default_cast.into();
        self
    }

    pub fn stack(&self) -> &ScopeStack {
        &self.stack
    }

    /// The live overlay.
    pub fn overlay(&self) -> &PropertyMap {
        &self.overlay
    }

    pub fn underlay(&self) -> &PropertyMap {
        &self.underlay
    }

    /// Overlay parked on the frame at `index`, if any.
    pub fn stored_overlay(&self, index: usize) -> Option<&PropertyMap> {
        self.stack.frame(index).and_then(|frame| frame.overlay.as_ref())
    }

    pub fn current_item(&self) -> Option<Item> {
        self.stack.current_item()
    }

    pub fn iterator_position(&self) -> IteratorPosition {
        self.stack.iterator_position()
    }

    /// Look up an injected value for `name`.
    ///
    /// Returns `Ok(None)` when no layer supplies the name, including when the
    /// current item has its own member of that name. With `cast`, the raw
    /// value is also turned into a renderable object.
    pub fn resolve(
        &self,
        name: &str,
        args: &[serde_json::Value],
        cast: bool,
    ) -> Result<Option<InjectedValue>> {
        let Some(source) = self.value_source(name)? else {
            return Ok(None);
        };

        let value = match source.value {
            SourceValue::Ready(value) if value.is_null() => {
                return Err(StrataError::InvalidPropertySource {
                    property: name.to_string(),
                });
            }
            SourceValue::Ready(value) => value,
            SourceValue::Call(callable) => callable(args).unwrap_or(Value::Raw(serde_json::Value::Null)),
            SourceValue::Iterator(entry, position) => entry
                .value(name, position, args)
                .unwrap_or(Value::Raw(serde_json::Value::Null)),
        };

        let obj = cast.then(|| self.cast_value(value.clone(), source.casting.as_deref()));

        Ok(Some(InjectedValue {
            layer: source.layer,
            value,
            obj,
        }))
    }

    fn value_source(&self, name: &str) -> Result<Option<ValueSource>> {
        if let Some(source) = Self::process_override(name, &self.overlay, Layer::Overlay) {
            return Ok(Some(source));
        }

        // The item's own member takes over from here on
        if let Some(on) = self.stack.current_item()
            && (on.has_field(name) || on.has_method(name))
        {
            return Ok(None);
        }

        if let Some(source) = Self::process_override(name, &self.underlay, Layer::Underlay) {
            return Ok(Some(source));
        }

        if let Some(entry) = self.registries.iterator_property(name)? {
            return Ok(Some(ValueSource {
                layer: Layer::Iterator,
                casting: entry.casting().map(str::to_string),
                value: SourceValue::Iterator(entry.clone(), self.stack.iterator_position()),
            }));
        }

        if let Some(entry) = self.registries.global_property(name)? {
            let value = match &entry.source {
                PropertySource::Literal(value) => SourceValue::Ready(value.clone()),
                PropertySource::Lazy(callable) => SourceValue::Call(Arc::clone(callable)),
            };
            return Ok(Some(ValueSource {
                layer: Layer::Global,
                value,
                casting: entry.casting.clone(),
            }));
        }

        Ok(None)
    }

    fn process_override(name: &str, overrides: &PropertyMap, layer: Layer) -> Option<ValueSource> {
        let entry = overrides.get(name)?;
        let value = match &entry.source {
            PropertySource::Literal(value) => value.clone(),
            // Late-evaluated overrides may still come back empty
            PropertySource::Lazy(callable) => callable(&[]).filter(|value| !value.is_null())?,
        };
        Some(ValueSource {
            layer,
            value: SourceValue::Ready(value),
            casting: entry.casting.clone(),
        })
    }

    fn cast_value(&self, value: Value, casting: Option<&str>) -> Item {
        match value {
            Value::Object(item) => item,
            Value::Raw(raw) => self.caster.cast(raw, casting.unwrap_or(&self.default_cast)),
        }
    }

    /// Start a lookup chain from the current local scope.
    pub fn locally(&mut self) -> &mut Self {
        self.stack.locally();
        self
    }

    /// One step of a lookup chain.
    ///
    /// `Up` and `Top` recover the overlay parked on the parent or outermost
    /// frame when the live overlay is empty; `Me` stays on the current item;
    /// any other name drills into the value found by [`get_obj`](Self::get_obj).
    pub fn obj(&mut self, name: &str, args: &[serde_json::Value]) -> Result<&mut Self> {
        let overlay_index = match name {
            "Up" => Some(self.stack.up_index().ok_or(StrataError::NoParentScope)?),
            "Top" => Some(0),
            _ => None,
        };

        if let Some(index) = overlay_index
            && self.overlay.is_empty()
            && let Some(stored) = self.stored_overlay(index)
        {
            self.overlay = stored.clone();
        }

        match name {
            "Up" => {
                self.stack.navigate_up()?;
            }
            "Top" => {
                self.stack.navigate_top();
            }
            "Me" => {
                let item = self.stack.current_item();
                self.stack.descend(item);
            }
            _ => {
                let item = self.get_obj(name, args)?;
                self.stack.descend(item);
            }
        }
        Ok(self)
    }

    /// Resolve `name` to an object: injected value first, then the item's member.
    pub fn get_obj(&self, name: &str, args: &[serde_json::Value]) -> Result<Option<Item>> {
        if let Some(injected) = self.resolve(name, args, true)? {
            return Ok(injected.obj);
        }
        Ok(self.stack.get_obj(name, args))
    }

    /// Enter a block, parking the live overlay on the frame being left.
    pub fn push_scope(&mut self) -> &mut Self {
        self.stack.push_scope();

        if let Some(up_index) = self.stack.up_index()
            && let Some(frame) = self.stack.frame_mut(up_index)
        {
            frame.overlay = Some(std::mem::take(&mut self.overlay));
        }
        self
    }

    /// Leave a block, restoring the overlay parked by the matching push.
    pub fn pop_scope(&mut self) -> &mut Self {
        if let Some(up_index) = self.stack.up_index() {
            self.overlay = self.stored_overlay(up_index).cloned().unwrap_or_default();
        }

        self.stack.pop_scope();
        self
    }

    /// Advance the active loop; see [`ScopeStack::next`].
    pub fn next(&mut self) -> Option<usize> {
        self.stack.next()
    }

    /// Render `name` as text and end the lookup chain.
    pub fn xml_val(&mut self, name: &str, args: &[serde_json::Value]) -> Result<String> {
        if let Some(injected) = self.resolve(name, args, true)? {
            let text = injected.obj.map(|obj| obj.for_template()).unwrap_or_default();
            self.stack.reset_local_scope();
            return Ok(text);
        }
        Ok(self.stack.xml_val(name, args))
    }

    /// Truthiness of `name`, end the lookup chain.
    pub fn has_value(&mut self, name: &str, args: &[serde_json::Value]) -> Result<bool> {
        if let Some(injected) = self.resolve(name, args, false)? {
            let result = injected.value.is_truthy();
            self.stack.reset_local_scope();
            return Ok(result);
        }
        Ok(self.stack.has_value(name, args))
    }

    /// The current item itself (`$Me`), end the lookup chain.
    pub fn self_item(&mut self) -> Option<Item> {
        self.stack.self_item()
    }
}

impl std::fmt::Debug for ScopeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut overlay: Vec<_> = self.overlay.names().collect();
        overlay.sort_unstable();
        let mut underlay: Vec<_> = self.underlay.names().collect();
        underlay.sort_unstable();

        f.debug_struct("ScopeResolver")
            .field("depth", &self.stack.depth())
            .field("overlay", &overlay)
            .field("underlay", &underlay)
            .field("default_cast", &self.default_cast)
            .finish()
    }
}
