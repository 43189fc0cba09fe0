//! Worker host
//!
//! The host owns the actual worker registration. It installs scripts when
//! asked, and it may also install one on its own (a byte-check update, or
//! an attacker's script). Every lifecycle step is reported as a
//! `WorkerEvent` so the coordinator can tell solicited installations from
//! unsolicited ones.

use crate::error::{StickyError, StickyResult};
use crate::net::{CacheMode, Network, Request};
use crate::worker::Version;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Redundant => "redundant",
        };
        write!(f, "{}", name)
    }
}

/// Whether the host may satisfy the script fetch from HTTP caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateViaCache {
    All,
    None,
}

/// A registered worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInstallation {
    pub script_url: String,
    pub state: WorkerState,
}

/// Lifecycle notifications delivered to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The host started installing a new worker
    InstallationStarted { script_url: String },
    /// The installing worker changed state
    InstallationReachedState {
        script_url: String,
        state: WorkerState,
    },
    /// The previously active worker changed state
    ActiveReachedState {
        script_url: String,
        state: WorkerState,
    },
    /// The canonical script was fetched and hashed
    FetchCompleted { version: Version },
}

/// Platform worker registration
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Register (or re-register) the worker at `script_url`
    async fn register(&self, script_url: &url::Url, update_via_cache: UpdateViaCache) -> StickyResult<()>;

    /// Remove the registration; returns whether one existed
    async fn unregister(&self) -> StickyResult<bool>;

    /// The active worker, if any
    async fn active(&self) -> StickyResult<Option<WorkerInstallation>>;
}

/// Host that installs scripts fetched over a `Network`
///
/// Optionally records the active installation to a JSON file so it
/// survives restarts.
pub struct LocalWorkerHost {
    network: Arc<dyn Network>,
    record: Option<PathBuf>,
    active: Mutex<Option<WorkerInstallation>>,
    events: Mutex<Option<mpsc::UnboundedSender<WorkerEvent>>>,
}

impl LocalWorkerHost {
    fn build(
        network: Arc<dyn Network>,
        record: Option<PathBuf>,
        active: Option<WorkerInstallation>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            network,
            record,
            active: Mutex::new(active),
            events: Mutex::new(Some(tx)),
        };
        (host, rx)
    }

    /// Host with no persisted record
    pub fn in_memory(network: Arc<dyn Network>) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        Self::build(network, None, None)
    }

    /// Host whose active installation is recorded at `path`
    pub async fn open(
        path: PathBuf,
        network: Arc<dyn Network>,
    ) -> StickyResult<(Self, mpsc::UnboundedReceiver<WorkerEvent>)> {
        let active = if path.exists() {
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| StickyError::io(format!("reading {}", path.display()), e))?;
            serde_json::from_str(&content)?
        } else {
            None
        };
        Ok(Self::build(network, Some(path), active))
    }

    /// Install a script behind the coordinator's back, as a compromised
    /// origin or a host-initiated update would
    pub async fn install_unsolicited(&self, script_url: &url::Url) -> StickyResult<()> {
        warn!("Installing {} without a registration request", script_url);
        self.register(script_url, UpdateViaCache::None).await
    }

    /// Stop delivering events; the receiver ends once drained
    pub fn close(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.take();
        }
    }

    fn emit(&self, event: WorkerEvent) {
        if let Ok(events) = self.events.lock() {
            if let Some(tx) = events.as_ref() {
                // A dropped receiver just means nobody is listening
                let _ = tx.send(event);
            }
        }
    }

    fn current(&self) -> StickyResult<Option<WorkerInstallation>> {
        self.active
            .lock()
            .map(|active| active.clone())
            .map_err(|_| StickyError::Host("worker state lock poisoned".to_string()))
    }

    fn replace(&self, next: Option<WorkerInstallation>) -> StickyResult<Option<WorkerInstallation>> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| StickyError::Host("worker state lock poisoned".to_string()))?;
        Ok(std::mem::replace(&mut *active, next))
    }

    async fn persist(&self, active: &Option<WorkerInstallation>) -> StickyResult<()> {
        let Some(path) = &self.record else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(active)?;
        fs::write(path, content)
            .await
            .map_err(|e| StickyError::io(format!("writing {}", path.display()), e))
    }
}

#[async_trait]
impl WorkerHost for LocalWorkerHost {
    async fn register(&self, script_url: &url::Url, update_via_cache: UpdateViaCache) -> StickyResult<()> {
        let previous = self.current()?;
        if previous.as_ref().is_some_and(|w| w.script_url == script_url.as_str()) {
            debug!("Worker {} already active", script_url);
            return Ok(());
        }

        let cache = match update_via_cache {
            UpdateViaCache::All => CacheMode::Default,
            UpdateViaCache::None => CacheMode::Reload,
        };
        let response = self
            .network
            .fetch(&Request::new(script_url.clone()).with_cache(cache))
            .await?;
        if !response.is_success() {
            return Err(StickyError::upstream_status(script_url.as_str(), response.status));
        }

        let url = script_url.to_string();
        self.emit(WorkerEvent::InstallationStarted {
            script_url: url.clone(),
        });
        for state in [WorkerState::Installed, WorkerState::Activating] {
            self.emit(WorkerEvent::InstallationReachedState {
                script_url: url.clone(),
                state,
            });
        }

        let installed = WorkerInstallation {
            script_url: url.clone(),
            state: WorkerState::Active,
        };
        self.replace(Some(installed.clone()))?;
        if let Some(old) = previous {
            self.emit(WorkerEvent::ActiveReachedState {
                script_url: old.script_url,
                state: WorkerState::Redundant,
            });
        }
        self.emit(WorkerEvent::InstallationReachedState {
            script_url: url,
            state: WorkerState::Active,
        });

        self.persist(&Some(installed)).await?;
        info!("Worker {} is active", script_url);
        Ok(())
    }

    async fn unregister(&self) -> StickyResult<bool> {
        let previous = self.replace(None)?;
        self.persist(&None).await?;
        if let Some(old) = &previous {
            self.emit(WorkerEvent::ActiveReachedState {
                script_url: old.script_url.clone(),
                state: WorkerState::Redundant,
            });
        }
        Ok(previous.is_some())
    }

    async fn active(&self) -> StickyResult<Option<WorkerInstallation>> {
        self.current()
    }
}
