//! Sticky update coordinator
//!
//! Pins the worker script to a content-derived version so the host can
//! never swap it silently, offers newer versions to the embedding
//! application, and bricks the client when it sees an installation it did
//! not ask for.
//!
//! # Phases
//!
//! | Phase | Meaning |
//! |-------|---------|
//! | Uninitialized | nothing pinned yet |
//! | Pinned | versioned script registered |
//! | CheckingForUpdate | canonical script being fetched |
//! | UpdateAvailable | canonical script differs from the pin |
//! | Updating | waiting for the old worker to retire |
//! | Bricked | tamper detected; terminal |
//!
//! An installation is solicited when the pending version equals the
//! current version, which holds only while this coordinator is driving a
//! registration. Any other installation is treated as tampering.

use crate::audit::AuditLog;
use crate::config::ProxyConfig;
use crate::error::{StickyError, StickyResult};
use crate::net::{CacheMode, Network, Request};
use crate::store::{KeyValueStore, VersionStore};
use crate::worker::contract;
use crate::worker::host::{UpdateViaCache, WorkerEvent, WorkerHost, WorkerState};
use crate::worker::version::{versioned_url, Version, VersionStyle};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Logged every time a bricked client refuses to proceed
pub const BRICK_WARNING: &str = "This client detected an unsolicited worker installation and has \
shut itself down. The site may be compromised. Do not enter sensitive data.";

/// Coordinator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Pinned(Version),
    CheckingForUpdate(Version),
    UpdateAvailable { current: Version, latest: Version },
    Updating { from: Version, to: Version },
    Bricked,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Pinned(v) => write!(f, "pinned({})", v),
            Self::CheckingForUpdate(v) => write!(f, "checking({})", v),
            Self::UpdateAvailable { current, latest } => {
                write!(f, "update-available({} -> {})", current, latest)
            }
            Self::Updating { from, to } => write!(f, "updating({} -> {})", from, to),
            Self::Bricked => write!(f, "bricked"),
        }
    }
}

/// A newer canonical script than the one pinned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    pub current: Version,
    pub latest: Version,
}

/// Result of `register`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// URL handed to the host
    pub script_url: Url,
    /// Pinned version (`None` in development mode)
    pub version: Option<Version>,
    /// Found by the post-registration check
    pub update: Option<AvailableUpdate>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Signal {
    retired: u64,
    bricked: bool,
}

#[derive(Debug, Clone)]
struct Policy {
    strict_header_check: bool,
    check_updates: bool,
    version_length: usize,
    version_style: VersionStyle,
    development: bool,
}

/// Drives worker registration and updates for one script
pub struct UpdateCoordinator {
    script_url: Url,
    policy: Policy,
    network: Arc<dyn Network>,
    host: Arc<dyn WorkerHost>,
    versions: VersionStore,
    volatile: Vec<Arc<dyn KeyValueStore>>,
    audit: AuditLog,
    phase: Mutex<Phase>,
    signal: watch::Sender<Signal>,
    /// Serializes the read of the pin and the write that advances it
    commit: Mutex<()>,
}

impl UpdateCoordinator {
    /// Create a coordinator for the canonical script at `script_url`
    ///
    /// Version keys are read from `store`, namespaced by
    /// `config.key_prefix`.
    pub fn new(
        script_url: Url,
        config: &ProxyConfig,
        network: Arc<dyn Network>,
        host: Arc<dyn WorkerHost>,
        store: Arc<dyn KeyValueStore>,
    ) -> StickyResult<Self> {
        let versions = VersionStore::new(store, &config.key_prefix);
        let phase = if versions.is_bricked()? {
            Phase::Bricked
        } else {
            match versions.current()? {
                Some(current) => Phase::Pinned(current),
                None => Phase::Uninitialized,
            }
        };
        let (signal, _) = watch::channel(Signal {
            bricked: phase == Phase::Bricked,
            ..Signal::default()
        });

        Ok(Self {
            script_url,
            policy: Policy {
                strict_header_check: config.strict_header_check,
                check_updates: config.check_updates,
                version_length: config.version_length,
                version_style: config.version_style,
                development: config.development,
            },
            network,
            host,
            versions,
            volatile: Vec::new(),
            audit: AuditLog::disabled(),
            phase: Mutex::new(phase),
            signal,
            commit: Mutex::new(()),
        })
    }

    /// Also wipe `store` when entering brick mode
    pub fn with_volatile_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.volatile.push(store);
        self
    }

    /// Record security events to `audit`
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Canonical script URL
    pub fn script_url(&self) -> &Url {
        &self.script_url
    }

    /// Persisted version state
    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn phase(&self) -> Phase {
        self.phase
            .lock()
            .map(|phase| phase.clone())
            .unwrap_or(Phase::Bricked)
    }

    fn set_phase(&self, next: Phase) {
        if let Ok(mut phase) = self.phase.lock() {
            if *phase == Phase::Bricked {
                return;
            }
            debug!("Update phase {} -> {}", *phase, next);
            *phase = next;
        }
    }

    /// URL of the immutable copy of the script at `version`
    pub fn versioned(&self, version: &Version) -> StickyResult<Url> {
        versioned_url(&self.script_url, version, self.policy.version_style)
    }

    fn refuse(&self) -> StickyError {
        error!("{}", BRICK_WARNING);
        StickyError::Bricked
    }

    fn ensure_not_bricked(&self) -> StickyResult<()> {
        if self.phase() == Phase::Bricked || self.versions.is_bricked()? {
            self.set_phase(Phase::Bricked);
            return Err(self.refuse());
        }
        Ok(())
    }

    /// Fetch the canonical script past every cache and derive its version
    async fn fetch_canonical_version(&self) -> StickyResult<Version> {
        let request = Request::new(self.script_url.clone()).with_cache(CacheMode::Reload);
        let response = self.network.fetch(&request).await?;
        if !response.is_success() {
            return Err(StickyError::upstream_status(
                self.script_url.as_str(),
                response.status,
            ));
        }

        contract::enforce(
            self.script_url.as_str(),
            &response,
            self.policy.strict_header_check,
        )?;
        Ok(Version::of_script(&response.body, self.policy.version_length))
    }

    /// Confirm the versioned URL serves the script that was hashed
    ///
    /// A missing or different copy is an error in strict mode and a
    /// warning otherwise.
    async fn check_versioned(&self, version: &Version) -> StickyResult<()> {
        let url = self.versioned(version)?;
        let response = self.network.fetch(&Request::new(url.clone())).await?;
        let reason = if response.is_success() {
            let served = Version::of_script(&response.body, self.policy.version_length);
            if served == *version {
                return Ok(());
            }
            format!("serves version {} instead of {}", served, version)
        } else {
            format!("returned status {}", response.status)
        };

        if self.policy.strict_header_check {
            return Err(StickyError::RegistrationContractViolation {
                url: url.to_string(),
                reason,
            });
        }
        warn!("Versioned script {} {}", url, reason);
        Ok(())
    }

    /// Register the worker
    ///
    /// On first run the canonical script is fetched, its version pinned and
    /// the versioned URL registered. Afterwards the pinned URL is
    /// re-registered and, unless disabled, an update check runs whose
    /// failure is only logged.
    pub async fn register(&self) -> StickyResult<Registration> {
        self.ensure_not_bricked()?;

        if self.policy.development {
            warn!("Development mode: registering {} unpinned", self.script_url);
            self.host
                .register(&self.script_url, UpdateViaCache::None)
                .await?;
            return Ok(Registration {
                script_url: self.script_url.clone(),
                version: None,
                update: None,
            });
        }

        let Some(current) = self.versions.current()? else {
            return self.register_first_run().await;
        };

        let url = self.versioned(&current)?;
        let installed = self
            .host
            .active()
            .await?
            .is_some_and(|worker| worker.script_url == url.as_str());
        if !installed {
            // The host lost the pinned worker; mark the reinstall as ours
            self.versions.pin(&current)?;
        }
        debug!("Registering pinned worker {}", url);
        self.host.register(&url, UpdateViaCache::All).await?;
        self.set_phase(Phase::Pinned(current.clone()));

        let update = if self.policy.check_updates {
            match self.check_for_update().await {
                Ok(update) => update,
                Err(e @ (StickyError::Bricked | StickyError::TamperDetected)) => return Err(e),
                Err(e) => {
                    warn!("Update check failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Registration {
            script_url: url,
            version: Some(current),
            update,
        })
    }

    async fn register_first_run(&self) -> StickyResult<Registration> {
        info!("No pinned worker, fetching {}", self.script_url);
        let version = self.fetch_canonical_version().await?;
        self.check_versioned(&version).await?;
        self.versions.pin(&version)?;

        let url = self.versioned(&version)?;
        self.host.register(&url, UpdateViaCache::All).await?;
        self.set_phase(Phase::Pinned(version.clone()));
        info!("Pinned worker version {}", version);

        self.audit
            .log(
                "worker.pinned",
                &serde_json::json!({
                    "version": version.as_str(),
                    "script_url": url.as_str(),
                }),
            )
            .await;

        Ok(Registration {
            script_url: url,
            version: Some(version),
            update: None,
        })
    }

    /// Fetch the canonical script and compare it with the pin
    pub async fn check_for_update(&self) -> StickyResult<Option<AvailableUpdate>> {
        self.ensure_not_bricked()?;
        let current = self
            .versions
            .current()?
            .ok_or_else(|| StickyError::User("No worker is pinned yet. Run: sticky register".to_string()))?;

        self.set_phase(Phase::CheckingForUpdate(current.clone()));
        let latest = match self.fetch_canonical_version().await {
            Ok(latest) => latest,
            Err(e) => {
                self.set_phase(Phase::Pinned(current));
                return Err(e);
            }
        };
        self.handle_event(WorkerEvent::FetchCompleted {
            version: latest.clone(),
        })
        .await?;

        if latest == current {
            debug!("Worker {} is up to date", current);
            Ok(None)
        } else {
            info!("Worker update available: {} -> {}", current, latest);
            Ok(Some(AvailableUpdate { current, latest }))
        }
    }

    /// Install an update the application accepted
    ///
    /// Returns `false` without doing anything when no worker is active or
    /// another updater already advanced the pin. Otherwise resolves once
    /// the previously active worker is retired.
    pub async fn apply_update(&self, update: &AvailableUpdate) -> StickyResult<bool> {
        self.ensure_not_bricked()?;

        if self.host.active().await?.is_none() {
            debug!("No active worker, skipping update");
            return Ok(false);
        }

        self.check_versioned(&update.latest).await?;

        let mut signal = self.signal.subscribe();
        let retired_before = signal.borrow().retired;
        let from = {
            let _commit = self
                .commit
                .lock()
                .map_err(|_| StickyError::Internal("update lock poisoned".to_string()))?;
            let current = self.versions.current()?;
            if current.as_ref() == Some(&update.latest) {
                info!("Worker already updated to {}", update.latest);
                if !matches!(self.phase(), Phase::Updating { .. }) {
                    self.set_phase(Phase::Pinned(update.latest.clone()));
                }
                return Ok(false);
            }
            self.versions.pin(&update.latest)?;
            current.unwrap_or_else(|| update.current.clone())
        };

        self.set_phase(Phase::Updating {
            from: from.clone(),
            to: update.latest.clone(),
        });

        let url = self.versioned(&update.latest)?;
        self.host.register(&url, UpdateViaCache::All).await?;

        let bricked = signal
            .wait_for(|s| s.bricked || s.retired > retired_before)
            .await
            .map_err(|_| StickyError::Internal("update signal closed".to_string()))?
            .bricked;
        if bricked {
            return Err(self.refuse());
        }

        self.set_phase(Phase::Pinned(update.latest.clone()));
        info!("Worker updated {} -> {}", from, update.latest);
        self.audit
            .log(
                "worker.updated",
                &serde_json::json!({
                    "from": from.as_str(),
                    "to": update.latest.as_str(),
                    "script_url": url.as_str(),
                }),
            )
            .await;
        Ok(true)
    }

    /// React to one host lifecycle event
    pub async fn handle_event(&self, event: WorkerEvent) -> StickyResult<()> {
        match event {
            WorkerEvent::InstallationStarted { script_url } => {
                if self.phase() == Phase::Bricked {
                    return Err(self.refuse());
                }
                let current = self.versions.current()?;
                let pending = self.versions.pending()?;
                if pending == current {
                    debug!("Solicited installation of {}", script_url);
                    return Ok(());
                }
                self.enter_brick_mode(&script_url, current, pending).await;
                Err(StickyError::TamperDetected)
            }
            WorkerEvent::InstallationReachedState { script_url, state } => {
                debug!("Installing worker {} is {}", script_url, state);
                if state == WorkerState::Installed {
                    if let Some(pending) = self.versions.pending()? {
                        if self.versioned(&pending)?.as_str() == script_url {
                            self.versions.set_pending(None)?;
                            debug!("Installation of {} confirmed", pending);
                        }
                    }
                }
                Ok(())
            }
            WorkerEvent::ActiveReachedState { script_url, state } => {
                debug!("Previous worker {} is {}", script_url, state);
                if state == WorkerState::Redundant {
                    self.signal.send_modify(|s| s.retired += 1);
                }
                Ok(())
            }
            WorkerEvent::FetchCompleted { version } => {
                if let Phase::CheckingForUpdate(current) = self.phase() {
                    if version == current {
                        self.set_phase(Phase::Pinned(current));
                    } else {
                        self.set_phase(Phase::UpdateAvailable {
                            current,
                            latest: version,
                        });
                    }
                }
                Ok(())
            }
        }
    }

    async fn enter_brick_mode(
        &self,
        script_url: &str,
        current: Option<Version>,
        pending: Option<Version>,
    ) {
        error!("Unsolicited worker installation detected: {}", script_url);

        // Synchronous wipe first, before anything can yield
        let stores = std::iter::once(self.versions.backing()).chain(self.volatile.iter());
        for store in stores {
            if let Err(e) = store.clear() {
                error!("Failed to clear storage: {}", e);
            }
        }

        match self.host.unregister().await {
            Ok(_) => warn!("Worker unregistered"),
            Err(e) => error!("Failed to unregister worker: {}", e),
        }
        if let Err(e) = self.versions.brick() {
            error!("Failed to persist brick flag: {}", e);
        }

        self.set_phase(Phase::Bricked);
        self.signal.send_modify(|s| s.bricked = true);

        self.audit
            .log(
                "worker.tamper_detected",
                &serde_json::json!({
                    "script_url": script_url,
                    "current_version": current.as_ref().map(Version::as_str),
                    "pending_version": pending.as_ref().map(Version::as_str),
                }),
            )
            .await;
        error!("{}", BRICK_WARNING);
    }

    /// Feed host events into `handle_event` until the host closes
    pub fn listen(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<WorkerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = self.handle_event(event).await {
                    error!("Worker event rejected: {}", e);
                }
            }
        })
    }
}
