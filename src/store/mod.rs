//! Synchronous key-value state
//!
//! Version pins live in a store that can be read and cleared without
//! yielding, so brick mode can wipe it before any other task runs.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StickyResult;
use crate::worker::Version;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Key of the version pinned for this client
pub const CURRENT_VERSION_KEY: &str = "service_worker.current.version";
/// Key of the version this client has asked the host to install
pub const PENDING_VERSION_KEY: &str = "service_worker.pending.version";
/// Key of the terminal tamper flag
pub const BRICKED_KEY: &str = "service_worker.bricked";

/// Synchronous string-keyed JSON store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StickyResult<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> StickyResult<()>;
    fn remove(&self, key: &str) -> StickyResult<()>;
    /// Remove every key
    fn clear(&self) -> StickyResult<()>;
    /// Every key present
    fn keys(&self) -> StickyResult<Vec<String>>;
}

/// Snapshot of the persisted update state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionState {
    pub current_version: Option<Version>,
    pub pending_version: Option<Version>,
    pub bricked: bool,
}

/// Typed access to the version keys
#[derive(Clone)]
pub struct VersionStore {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl VersionStore {
    /// Wrap a store; every key is namespaced by `prefix`
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn read_version(&self, name: &str) -> StickyResult<Option<Version>> {
        let key = self.key(name);
        match self.store.get(&key)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(token)) => Ok(Some(Version::new(token))),
            Some(other) => {
                warn!("Ignoring malformed value for {}: {}", key, other);
                Ok(None)
            }
        }
    }

    fn write_version(&self, name: &str, version: Option<&Version>) -> StickyResult<()> {
        let key = self.key(name);
        match version {
            Some(version) => self.store.set(&key, Value::String(version.to_string())),
            None => self.store.remove(&key),
        }
    }

    /// Version this client is pinned to
    pub fn current(&self) -> StickyResult<Option<Version>> {
        self.read_version(CURRENT_VERSION_KEY)
    }

    /// Version awaiting installation
    pub fn pending(&self) -> StickyResult<Option<Version>> {
        self.read_version(PENDING_VERSION_KEY)
    }

    pub fn set_current(&self, version: Option<&Version>) -> StickyResult<()> {
        self.write_version(CURRENT_VERSION_KEY, version)
    }

    pub fn set_pending(&self, version: Option<&Version>) -> StickyResult<()> {
        self.write_version(PENDING_VERSION_KEY, version)
    }

    /// Pin `version` and mark it as the one being installed
    ///
    /// Pending is written first so a crash in between never leaves an
    /// installation looking solicited when it was not.
    pub fn pin(&self, version: &Version) -> StickyResult<()> {
        self.set_pending(Some(version))?;
        self.set_current(Some(version))
    }

    /// Whether the tamper flag is set
    pub fn is_bricked(&self) -> StickyResult<bool> {
        Ok(matches!(
            self.store.get(&self.key(BRICKED_KEY))?,
            Some(Value::Bool(true))
        ))
    }

    /// Set the tamper flag
    pub fn brick(&self) -> StickyResult<()> {
        self.store.set(&self.key(BRICKED_KEY), Value::Bool(true))
    }

    /// Read everything at once
    pub fn state(&self) -> StickyResult<VersionState> {
        Ok(VersionState {
            current_version: self.current()?,
            pending_version: self.pending()?,
            bricked: self.is_bricked()?,
        })
    }

    /// Underlying store
    pub fn backing(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }
}
