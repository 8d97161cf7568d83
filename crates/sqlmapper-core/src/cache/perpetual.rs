//! The default unbounded cache implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::cache::{Cache, CacheKey};
use crate::value::Value;

/// Keeps every entry until cleared.
#[derive(Debug)]
pub struct PerpetualCache {
    id: String,
    entries: RwLock<HashMap<CacheKey, Value>>,
}

impl PerpetualCache {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Cache for PerpetualCache {
    fn id(&self) -> &str {
        &self.id
    }

    fn put(&self, key: CacheKey, value: Value) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .get(key)
            .cloned()
    }

    fn remove(&self, key: &CacheKey) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(key);
    }

    fn clear(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }

    fn size(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }
}
