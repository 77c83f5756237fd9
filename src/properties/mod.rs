//! Injected property sources.
//!
//! Overlay and underlay maps, global properties and iterator properties all
//! describe a value the same way: a [`PropertySource`] that is either a literal
//! or a lazily evaluated closure, plus an optional declared casting.
//!
//! Lazy sources are evaluated on every lookup, never memoized, so a closure
//! that reads changing state yields fresh values each time it is referenced.

pub mod global;
pub mod iterator;
pub mod registry;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::Value;

pub use global::{GlobalProperties, GlobalPropertyProvider};
pub use iterator::{BasicIteratorSupport, IteratorPosition, IteratorPropertyProvider};
pub use registry::{DuplicatePolicy, PropertyRegistries};

/// Closure behind a lazy source. Returning `None` means "no value".
pub type LazyFn = Arc<dyn Fn(&[serde_json::Value]) -> Option<Value> + Send + Sync>;

/// Where an injected value comes from.
#[derive(Clone)]
pub enum PropertySource {
    /// A fixed value
    Literal(Value),
    /// A closure evaluated at lookup time
    Lazy(LazyFn),
}

impl fmt::Debug for PropertySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// A property source together with its declared casting.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub source: PropertySource,
    pub casting: Option<String>,
}

impl SourceEntry {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self {
            source: PropertySource::Literal(value.into()),
            casting: None,
        }
    }

    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            source: PropertySource::Lazy(Arc::new(f)),
            casting: None,
        }
    }

    pub fn with_casting(mut self, casting: impl Into<String>) -> Self {
        self.casting = Some(casting.into());
        self
    }
}

/// Named property sources supplied per render (overlay or underlay).
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    entries: HashMap<String, SourceEntry>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map of literals from a JSON object; other JSON yields an empty map.
    pub fn from_json(value: serde_json::Value) -> Self {
        let mut map = Self::new();
        if let serde_json::Value::Object(fields) = value {
            for (name, value) in fields {
                map.insert(name, SourceEntry::literal(value));
            }
        }
        map
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: SourceEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn with_literal(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, SourceEntry::literal(value));
        self
    }

    pub fn with_lazy<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Option<Value> + Send + Sync + 'static,
    {
        self.insert(name, SourceEntry::lazy(f));
        self
    }

    pub fn with_entry(mut self, name: impl Into<String>, entry: SourceEntry) -> Self {
        self.insert(name, entry);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SourceEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
