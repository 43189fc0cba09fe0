//! Process-local key-value store

use super::KeyValueStore;
use crate::error::{StickyError, StickyResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Store that forgets everything when dropped
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> StickyResult<MutexGuard<'_, BTreeMap<String, Value>>> {
        self.values
            .lock()
            .map_err(|_| StickyError::Store("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StickyResult<Option<Value>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> StickyResult<()> {
        self.values()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StickyResult<()> {
        self.values()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> StickyResult<()> {
        self.values()?.clear();
        Ok(())
    }

    fn keys(&self) -> StickyResult<Vec<String>> {
        Ok(self.values()?.keys().cloned().collect())
    }
}
