//! Shared wiring for commands
//!
//! Builds the on-disk backends (state store, cache directory, worker
//! record, audit log) and the HTTP transport from configuration.

use crate::audit::AuditLog;
use crate::cache::DiskCacheStorage;
use crate::config::{Config, StatePaths};
use crate::error::{StickyError, StickyResult};
use crate::manifest::Manifest;
use crate::net::{HttpNetwork, Network};
use crate::proxy::Proxy;
use crate::store::FileStore;
use crate::worker::{LocalWorkerHost, UpdateCoordinator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

/// Everything a command needs from the environment
pub struct CommandContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub paths: StatePaths,
}

/// A coordinator wired to a recording host, with its event listener
pub struct WorkerSession {
    pub coordinator: Arc<UpdateCoordinator>,
    pub host: Arc<LocalWorkerHost>,
    listener: JoinHandle<()>,
}

impl WorkerSession {
    /// Deliver every pending host event, then stop listening
    pub async fn finish(self) -> StickyResult<()> {
        self.host.close();
        self.listener
            .await
            .map_err(|e| StickyError::Internal(format!("event listener failed: {}", e)))
    }
}

/// Parse a URL argument
pub fn parse_url(raw: &str) -> StickyResult<Url> {
    Url::parse(raw).map_err(|e| StickyError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

impl CommandContext {
    pub fn new(config: Config, config_path: PathBuf, paths: StatePaths) -> Self {
        Self {
            config,
            config_path,
            paths,
        }
    }

    pub fn audit(&self) -> AuditLog {
        AuditLog::new(&self.config, &self.paths)
    }

    pub fn network(&self) -> Arc<dyn Network> {
        Arc::new(HttpNetwork::new())
    }

    pub fn cache_storage(&self) -> Arc<DiskCacheStorage> {
        Arc::new(DiskCacheStorage::new(self.paths.caches_dir()))
    }

    pub fn store(&self) -> StickyResult<Arc<FileStore>> {
        Ok(Arc::new(FileStore::open(self.paths.storage_file())?))
    }

    pub async fn manifest(&self, path: &Path) -> StickyResult<Manifest> {
        if !path.exists() {
            return Err(StickyError::PathNotFound(path.to_path_buf()));
        }
        Manifest::from_file(path, self.config.proxy.digest_scheme).await
    }

    /// Proxy for `origin` backed by the state directory
    pub async fn proxy(&self, origin: Url, manifest_path: &Path) -> StickyResult<Proxy> {
        self.paths.ensure().await?;
        let manifest = self.manifest(manifest_path).await?;
        Ok(Proxy::new(
            origin,
            manifest,
            &self.config.proxy,
            self.network(),
            self.cache_storage(),
        )?
        .with_audit(self.audit()))
    }

    /// Coordinator for `script`, listening to the recorded host
    pub async fn worker(&self, script: &str) -> StickyResult<WorkerSession> {
        self.paths.ensure().await?;
        let script_url = parse_url(script)?;
        let network = self.network();

        let (host, events) = LocalWorkerHost::open(self.paths.worker_file(), network.clone()).await?;
        let host = Arc::new(host);
        let coordinator = Arc::new(
            UpdateCoordinator::new(
                script_url,
                &self.config.proxy,
                network,
                host.clone(),
                self.store()?,
            )?
            .with_audit(self.audit()),
        );
        debug!("Worker state at {}", self.paths.root().display());

        let listener = coordinator.clone().listen(events);
        Ok(WorkerSession {
            coordinator,
            host,
            listener,
        })
    }
}
