//! The item model templates render against.
//!
//! The resolver only needs a handful of capabilities from the data it renders:
//! whether an item exposes a field or method under some name, how to drill into
//! a named sub-item, how to render itself as text, whether it "exists"
//! (truthiness), and, for collections, its elements. [`ViewableData`] captures
//! exactly that contract. [`DataObject`] and [`DataList`] are JSON-backed
//! implementations, and [`field::DbField`] is the typed scalar wrapper produced
//! by casting.

pub mod data;
pub mod field;

use std::fmt;
use std::sync::Arc;

pub use data::{DataList, DataObject, Method};
pub use field::{CastHook, DbField, DefaultCaster, FieldKind};

/// Shared handle to anything a template can render.
pub type Item = Arc<dyn ViewableData>;

/// Capabilities a rendered item exposes to templates.
pub trait ViewableData: fmt::Debug + Send + Sync {
    /// Whether the item has a data member called `name`.
    fn has_field(&self, name: &str) -> bool;

    /// Whether the item has a callable member called `name`.
    fn has_method(&self, _name: &str) -> bool {
        false
    }

    /// Look up a named member as a renderable item.
    fn obj(&self, name: &str, args: &[serde_json::Value]) -> Option<Item>;

    /// Render the item itself as template output.
    fn for_template(&self) -> String;

    /// Truthiness used by `<% if %>` checks.
    fn exists(&self) -> bool {
        true
    }

    /// Elements of the item when it is a collection.
    fn items(&self) -> Option<Vec<Item>> {
        None
    }

    /// Render a named member, or an empty string when it is absent.
    fn xml_val(&self, name: &str, args: &[serde_json::Value]) -> String {
        self.obj(name, args).map(|obj| obj.for_template()).unwrap_or_default()
    }

    /// Truthiness of a named member; absent members are false.
    fn has_value(&self, name: &str, args: &[serde_json::Value]) -> bool {
        self.obj(name, args).is_some_and(|obj| obj.exists())
    }
}

/// A value injected into a scope: either raw data still to be cast, or an
/// item that is already renderable.
#[derive(Clone)]
pub enum Value {
    /// Raw scalar or structured data
    Raw(serde_json::Value),
    /// An already typed object, used as-is
    Object(Item),
}

impl Value {
    /// Truthiness without casting.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Raw(raw) => json_truthy(raw),
            Self::Object(item) => item.exists(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Raw(serde_json::Value::Null))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(raw) => f.debug_tuple("Raw").field(raw).finish(),
            Self::Object(item) => f.debug_tuple("Object").field(item).finish(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Raw(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Raw(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Raw(serde_json::Value::String(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Raw(serde_json::Value::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Raw(serde_json::Value::from(value))
    }
}

impl From<Item> for Value {
    fn from(value: Item) -> Self {
        Self::Object(value)
    }
}

/// Truthiness of raw JSON data, following loose scripting-language rules.
pub fn json_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty() && s != "0",
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

/// Text form of a raw JSON scalar.
pub fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(true) => "1".to_string(),
        serde_json::Value::Bool(false) => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
