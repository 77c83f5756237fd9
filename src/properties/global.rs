//! Global properties: values available identically in every scope.

use crate::model::Value;

use super::SourceEntry;

/// Supplies named global properties.
pub trait GlobalPropertyProvider: Send + Sync {
    fn global_properties(&self) -> Vec<(String, SourceEntry)>;
}

/// A provider assembled from literals and closures.
///
/// ```rust
/// use strata::model::Value;
/// use strata::properties::GlobalProperties;
///
/// let globals = GlobalProperties::new()
///     .literal("SiteName", "Example")
///     .lazy("Year", |_| Some(Value::from(2026_i64)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GlobalProperties {
    entries: Vec<(String, SourceEntry)>,
}

impl GlobalProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn literal(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), SourceEntry::literal(value)));
        self
    }

    pub fn lazy<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Option<Value> + Send + Sync + 'static,
    {
        self.entries.push((name.into(), SourceEntry::lazy(f)));
        self
    }

    pub fn entry(mut self, name: impl Into<String>, entry: SourceEntry) -> Self {
        self.entries.push((name.into(), entry));
        self
    }
}

impl GlobalPropertyProvider for GlobalProperties {
    fn global_properties(&self) -> Vec<(String, SourceEntry)> {
        self.entries.clone()
    }
}
