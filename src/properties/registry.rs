//! Process-wide tables of iterator and global properties.
//!
//! Providers are registered up front; the lookup tables are built lazily on the
//! first lookup and are read-only from then on. A registries value is shared
//! (`Arc`) between the engine and every resolver it creates, so the tables are
//! built once per engine rather than once per render.
//!
//! Two providers claiming the same name is governed by [`DuplicatePolicy`]:
//! `LastWins` keeps the later registration and logs a warning, `Reject` makes
//! every lookup fail with a configuration error naming the duplicate.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use super::global::GlobalPropertyProvider;
use super::iterator::{BasicIteratorSupport, IteratorPosition, IteratorPropertyProvider};
use super::SourceEntry;
use crate::core::{Result, StrataError};
use crate::model::Value;

/// What to do when a property name is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    LastWins,
    Reject,
}

/// A registered iterator property.
#[derive(Clone)]
pub struct IteratorEntry {
    provider: Arc<dyn IteratorPropertyProvider>,
    casting: Option<String>,
}

impl IteratorEntry {
    pub fn value(
        &self,
        name: &str,
        position: IteratorPosition,
        args: &[serde_json::Value],
    ) -> Option<Value> {
        self.provider.iterator_value(name, position, args)
    }

    pub fn casting(&self) -> Option<&str> {
        self.casting.as_deref()
    }
}

impl fmt::Debug for IteratorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IteratorEntry").field("casting", &self.casting).finish_non_exhaustive()
    }
}

type Table<T> = OnceLock<Result<HashMap<String, T>>>;

/// Iterator and global property tables.
pub struct PropertyRegistries {
    policy: DuplicatePolicy,
    iterator_providers: Vec<Arc<dyn IteratorPropertyProvider>>,
    global_providers: Vec<Arc<dyn GlobalPropertyProvider>>,
    iterator_table: Table<IteratorEntry>,
    global_table: Table<SourceEntry>,
}

impl PropertyRegistries {
    /// Empty registries with no providers.
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            iterator_providers: Vec::new(),
            global_providers: Vec::new(),
            iterator_table: OnceLock::new(),
            global_table: OnceLock::new(),
        }
    }

    /// Registries with the built-in loop helpers registered.
    pub fn standard(policy: DuplicatePolicy) -> Self {
        Self::new(policy).with_iterator_provider(BasicIteratorSupport)
    }

    pub fn with_iterator_provider(mut self, provider: impl IteratorPropertyProvider + 'static) -> Self {
        self.iterator_providers.push(Arc::new(provider));
        self.iterator_table = OnceLock::new();
        self
    }

    pub fn with_global_provider(mut self, provider: impl GlobalPropertyProvider + 'static) -> Self {
        self.global_providers.push(Arc::new(provider));
        self.global_table = OnceLock::new();
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Whether the lookup tables have been built yet.
    pub fn is_built(&self) -> bool {
        self.iterator_table.get().is_some() || self.global_table.get().is_some()
    }

    pub fn iterator_property(&self, name: &str) -> Result<Option<&IteratorEntry>> {
        let table = self.iterator_table.get_or_init(|| self.build_iterator_table());
        table.as_ref().map(|table| table.get(name)).map_err(Clone::clone)
    }

    pub fn global_property(&self, name: &str) -> Result<Option<&SourceEntry>> {
        let table = self.global_table.get_or_init(|| self.build_global_table());
        table.as_ref().map(|table| table.get(name)).map_err(Clone::clone)
    }

    fn build_iterator_table(&self) -> Result<HashMap<String, IteratorEntry>> {
        let mut table = HashMap::new();
        for provider in &self.iterator_providers {
            for declaration in provider.iterator_properties() {
                let entry = IteratorEntry {
                    provider: Arc::clone(provider),
                    casting: declaration.casting,
                };
                insert_checked(&mut table, declaration.name, entry, self.policy, "iterator")?;
            }
        }
        tracing::debug!("Built iterator property table with {} entries", table.len());
        Ok(table)
    }

    fn build_global_table(&self) -> Result<HashMap<String, SourceEntry>> {
        let mut table = HashMap::new();
        for provider in &self.global_providers {
            for (name, entry) in provider.global_properties() {
                insert_checked(&mut table, name, entry, self.policy, "global")?;
            }
        }
        tracing::debug!("Built global property table with {} entries", table.len());
        Ok(table)
    }
}

impl Default for PropertyRegistries {
    fn default() -> Self {
        Self::standard(DuplicatePolicy::default())
    }
}

impl fmt::Debug for PropertyRegistries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRegistries")
            .field("policy", &self.policy)
            .field("iterator_providers", &self.iterator_providers.len())
            .field("global_providers", &self.global_providers.len())
            .field("built", &self.is_built())
            .finish()
    }
}

fn insert_checked<T>(
    table: &mut HashMap<String, T>,
    name: String,
    value: T,
    policy: DuplicatePolicy,
    kind: &str,
) -> Result<()> {
    if table.contains_key(&name) {
        match policy {
            DuplicatePolicy::LastWins => {
                tracing::warn!("{kind} property '{name}' registered more than once, last wins");
            }
            DuplicatePolicy::Reject => {
                return Err(StrataError::ConfigError {
                    message: format!("{kind} property '{name}' is registered more than once"),
                });
            }
        }
    }
    table.insert(name, value);
    Ok(())
}
