//! Partial-cache-block store.
//!
//! `<% cached %>` sections memoize their rendered output here. The store is
//! shared between every render an engine performs and offers no transactional
//! guarantees: concurrent renders may read and write the same key, and the
//! last write wins.

use dashmap::DashMap;
use std::fmt;

/// Key-value storage for rendered template fragments.
pub trait CacheBlockStore: fmt::Debug + Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    /// Drop every stored fragment.
    fn clear(&self);

    /// Number of stored fragments, when the store can tell.
    fn len(&self) -> Option<usize> {
        None
    }
}

/// In-process store backed by a concurrent map.
#[derive(Default)]
pub struct MemoryCacheBlockStore {
    entries: DashMap<String, String>,
}

impl MemoryCacheBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBlockStore for MemoryCacheBlockStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

impl fmt::Debug for MemoryCacheBlockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCacheBlockStore").field("entries", &self.entries.len()).finish()
    }
}
