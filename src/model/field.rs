//! Typed field wrappers and the cast hook.
//!
//! Raw values injected into a scope are not rendered directly. They pass
//! through a [`CastHook`] together with a cast name (the source's declared
//! casting or the configured default), which produces a renderable item.
//! [`DefaultCaster`] maps the cast names below onto [`DbField`]:
//!
//! | Cast name | Rendering |
//! |---|---|
//! | `Text`, `Varchar` | HTML-escaped text |
//! | `HTMLFragment`, `HTMLText` | raw markup |
//! | `Boolean` | `1` or `0` |
//! | `Int` | integer |
//! | `Decimal` | two decimal places |
//!
//! Structured JSON (objects and arrays) is wrapped as [`DataObject`] /
//! [`DataList`] whatever the cast name, so it can be drilled into and looped.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::{DataList, DataObject, Item, ViewableData, json_text, json_truthy};

/// Turns a raw value into a renderable item.
pub trait CastHook: fmt::Debug + Send + Sync {
    fn cast(&self, value: serde_json::Value, casting: &str) -> Item;
}

/// Field types understood by [`DefaultCaster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Varchar,
    HtmlFragment,
    Boolean,
    Int,
    Decimal,
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Text" => Ok(Self::Text),
            "Varchar" => Ok(Self::Varchar),
            "HTMLFragment" | "HTMLText" => Ok(Self::HtmlFragment),
            "Boolean" => Ok(Self::Boolean),
            "Int" => Ok(Self::Int),
            "Decimal" => Ok(Self::Decimal),
            other => Err(format!("unknown field type '{other}'")),
        }
    }
}

/// A scalar wrapped with its field type.
#[derive(Debug, Clone)]
pub struct DbField {
    kind: FieldKind,
    value: serde_json::Value,
}

impl DbField {
    pub fn new(kind: FieldKind, value: serde_json::Value) -> Self {
        Self {
            kind,
            value,
        }
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Unescaped text form.
    pub fn raw(&self) -> String {
        match self.kind {
            FieldKind::Boolean => {
                if json_truthy(&self.value) {
                    "1".to_string()
                } else {
                    "0".to_string()
                }
            }
            FieldKind::Int => match &self.value {
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .map(|i| i.to_string())
                    .or_else(|| n.as_f64().map(|f| (f.trunc() as i64).to_string()))
                    .unwrap_or_default(),
                serde_json::Value::String(s) => {
                    s.trim().parse::<i64>().map(|i| i.to_string()).unwrap_or_else(|_| "0".into())
                }
                serde_json::Value::Bool(b) => i64::from(*b).to_string(),
                _ => "0".to_string(),
            },
            FieldKind::Decimal => {
                let number = match &self.value {
                    serde_json::Value::Number(n) => n.as_f64().unwrap_or_default(),
                    serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or_default(),
                    _ => 0.0,
                };
                format!("{number:.2}")
            }
            FieldKind::Text | FieldKind::Varchar | FieldKind::HtmlFragment => {
                json_text(&self.value)
            }
        }
    }
}

impl ViewableData for DbField {
    fn has_field(&self, name: &str) -> bool {
        matches!(name, "RAW" | "XML" | "UpperCase" | "LowerCase")
    }

    fn obj(&self, name: &str, _args: &[serde_json::Value]) -> Option<Item> {
        let text = match name {
            "RAW" => return Some(Arc::new(Self::new(FieldKind::HtmlFragment, self.raw().into()))),
            "XML" => return Some(Arc::new(Self::new(FieldKind::Text, self.raw().into()))),
            "UpperCase" => self.raw().to_uppercase(),
            "LowerCase" => self.raw().to_lowercase(),
            _ => return None,
        };
        Some(Arc::new(Self::new(self.kind, text.into())))
    }

    fn for_template(&self) -> String {
        match self.kind {
            FieldKind::Text | FieldKind::Varchar => escape_html(&self.raw()),
            _ => self.raw(),
        }
    }

    fn exists(&self) -> bool {
        json_truthy(&self.value)
    }
}

/// Build a typed field for a raw value, like a field factory keyed by type name.
pub fn create_field(kind: FieldKind, value: serde_json::Value) -> Item {
    match value {
        serde_json::Value::Object(_) => Arc::new(DataObject::from_json(value)),
        serde_json::Value::Array(items) => Arc::new(DataList::from_json(items)),
        scalar => Arc::new(DbField::new(kind, scalar)),
    }
}

/// Cast hook backed by [`FieldKind`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCaster;

impl CastHook for DefaultCaster {
    fn cast(&self, value: serde_json::Value, casting: &str) -> Item {
        let kind = casting.parse::<FieldKind>().unwrap_or_else(|err| {
            tracing::warn!("{err}, casting as Text");
            FieldKind::Text
        });
        create_field(kind, value)
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
