//! JSON-backed items.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::field::{FieldKind, create_field};
use super::{Item, Value, ViewableData};

/// A callable member of a [`DataObject`].
pub type Method = Arc<dyn Fn(&[serde_json::Value]) -> Value + Send + Sync>;

/// A record of named fields, optionally with callable members.
///
/// Fields are cast to [`FieldKind::Text`] unless a different casting was
/// declared with [`DataObject::with_casting`]. When a field and a method share a
/// name, the method wins.
#[derive(Clone, Default)]
pub struct DataObject {
    fields: serde_json::Map<String, serde_json::Value>,
    methods: HashMap<String, Method>,
    casting: HashMap<String, FieldKind>,
    text: Option<String>,
}

impl DataObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value. Non-object values produce an empty record.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(fields) => Self {
                fields,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn with_casting(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.casting.insert(field.into(), kind);
        self
    }

    /// Text produced when the record itself is rendered.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    fn cast_field(&self, name: &str, value: serde_json::Value) -> Item {
        let kind = self.casting.get(name).copied().unwrap_or(FieldKind::Text);
        create_field(kind, value)
    }
}

impl fmt::Debug for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("DataObject")
            .field("fields", &self.fields)
            .field("methods", &methods)
            .finish()
    }
}

impl ViewableData for DataObject {
    fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn obj(&self, name: &str, args: &[serde_json::Value]) -> Option<Item> {
        if let Some(method) = self.methods.get(name) {
            return Some(match method(args) {
                Value::Object(item) => item,
                Value::Raw(raw) => self.cast_field(name, raw),
            });
        }
        self.fields.get(name).map(|value| self.cast_field(name, value.clone()))
    }

    fn for_template(&self) -> String {
        self.text.clone().unwrap_or_default()
    }

    fn exists(&self) -> bool {
        !self.fields.is_empty() || !self.methods.is_empty() || self.text.is_some()
    }
}

/// An ordered collection of items.
#[derive(Debug, Clone, Default)]
pub struct DataList {
    items: Vec<Item>,
}

impl DataList {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
        }
    }

    pub fn from_json(values: Vec<serde_json::Value>) -> Self {
        Self::new(values.into_iter().map(|value| create_field(FieldKind::Text, value)).collect())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ViewableData for DataList {
    fn has_field(&self, name: &str) -> bool {
        matches!(name, "Count" | "First" | "Last")
    }

    fn obj(&self, name: &str, _args: &[serde_json::Value]) -> Option<Item> {
        match name {
            "Count" => Some(create_field(FieldKind::Int, self.items.len().into())),
            "First" => self.items.first().cloned(),
            "Last" => self.items.last().cloned(),
            _ => None,
        }
    }

    fn for_template(&self) -> String {
        self.items.iter().map(|item| item.for_template()).collect::<Vec<_>>().join(", ")
    }

    fn exists(&self) -> bool {
        !self.items.is_empty()
    }

    fn items(&self) -> Option<Vec<Item>> {
        Some(self.items.clone())
    }
}
