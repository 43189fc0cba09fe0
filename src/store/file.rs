//! JSON file key-value store
//!
//! The file is the only copy of the data. Every read loads it and every
//! change is a read-modify-write of one key, so several handles on the
//! same file (two CLI runs, two contexts) see each other's writes and never
//! drop keys they did not touch. Writes go through a uniquely named
//! temporary file and a rename.

use super::KeyValueStore;
use crate::error::{StickyError, StickyResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::debug;

/// Write-through store backed by one JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Use `path`, which need not exist yet; an unreadable file is an error
    pub fn open(path: impl Into<PathBuf>) -> StickyResult<Self> {
        let store = Self {
            path: path.into(),
            lock: Mutex::new(()),
        };
        let values = store.load()?;
        debug!(
            "Opened state store {} ({} keys)",
            store.path.display(),
            values.len()
        );
        Ok(store)
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> StickyResult<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| StickyError::Store("file store lock poisoned".to_string()))
    }

    fn load(&self) -> StickyResult<BTreeMap<String, Value>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StickyError::Store(format!("{} is not a JSON object: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StickyError::io(format!("reading {}", self.path.display()), e)),
        }
    }

    fn persist(&self, values: &BTreeMap<String, Value>) -> StickyResult<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .map_err(|e| StickyError::io(format!("creating {}", parent.display()), e))?;

        let content = serde_json::to_string_pretty(values)?;
        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|e| StickyError::io(format!("creating temp file in {}", parent.display()), e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| StickyError::io(format!("writing {}", tmp.path().display()), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StickyError::io(format!("replacing {}", self.path.display()), e.error))?;
        Ok(())
    }

    fn mutate(&self, change: impl FnOnce(&mut BTreeMap<String, Value>)) -> StickyResult<()> {
        let _guard = self.guard()?;
        let mut values = self.load()?;
        change(&mut values);
        self.persist(&values)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StickyResult<Option<Value>> {
        let _guard = self.guard()?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> StickyResult<()> {
        self.mutate(|values| {
            values.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> StickyResult<()> {
        self.mutate(|values| {
            values.remove(key);
        })
    }

    fn clear(&self) -> StickyResult<()> {
        self.mutate(BTreeMap::clear)
    }

    fn keys(&self) -> StickyResult<Vec<String>> {
        let _guard = self.guard()?;
        Ok(self.load()?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("storage.json");

        let store = FileStore::open(&path).unwrap();
        store.set("service_worker.current.version", Value::from("abc123")).unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("service_worker.current.version").unwrap(),
            Some(Value::from("abc123"))
        );
    }

    #[test]
    fn clear_is_written_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileStore::open(&path).unwrap();
        store.set("a", Value::Bool(true)).unwrap();
        store.clear().unwrap();

        assert!(FileStore::open(&path).unwrap().keys().unwrap().is_empty());
    }

    #[test]
    fn handles_on_one_file_share_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        let first = FileStore::open(&path).unwrap();
        let second = FileStore::open(&path).unwrap();

        first.clear().unwrap();
        first.set("service_worker.bricked", Value::Bool(true)).unwrap();
        assert_eq!(
            second.get("service_worker.bricked").unwrap(),
            Some(Value::Bool(true))
        );

        second
            .set("service_worker.current.version", Value::from("bbbbbb"))
            .unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("service_worker.bricked").unwrap(),
            Some(Value::Bool(true))
        );
        assert_eq!(
            reopened.get("service_worker.current.version").unwrap(),
            Some(Value::from("bbbbbb"))
        );
    }

    #[test]
    fn rejects_garbage_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "[1, 2").unwrap();

        assert!(matches!(FileStore::open(&path), Err(StickyError::Store(_))));
    }
}
