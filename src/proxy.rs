//! Request interception
//!
//! Ties the resolver, the verified fetcher and the generation manager into
//! the three hooks a host calls: install, activate, and per-request
//! handling. Requests outside the origin or absent from the manifest are
//! left to the host.

use crate::audit::AuditLog;
use crate::cache::{CacheStorage, GenerationManager, PrecacheReport, VerifiedFetcher};
use crate::config::ProxyConfig;
use crate::error::{StickyError, StickyResult};
use crate::manifest::Manifest;
use crate::net::{CacheMode, Network, Response};
use crate::resolve::{Candidate, Resolver};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Verifying proxy for one origin and manifest
pub struct Proxy {
    origin: Url,
    resolver: Resolver,
    fetcher: VerifiedFetcher,
    generations: GenerationManager,
    audit: AuditLog,
    development: bool,
}

impl Proxy {
    pub fn new(
        origin: Url,
        manifest: Manifest,
        config: &ProxyConfig,
        network: Arc<dyn Network>,
        storage: Arc<dyn CacheStorage>,
    ) -> StickyResult<Self> {
        if origin.cannot_be_a_base() || origin.host().is_none() {
            return Err(StickyError::InvalidUrl {
                url: origin.to_string(),
                reason: "origin must be an absolute http(s) URL".to_string(),
            });
        }

        let manifest = Arc::new(manifest);
        let generations = GenerationManager::new(storage.clone(), &config.cache_prefix, &manifest);
        Ok(Self {
            resolver: Resolver::new(manifest, &config.fallback_rules),
            fetcher: VerifiedFetcher::new(network, storage, origin.clone()),
            generations,
            origin,
            audit: AuditLog::disabled(),
            development: config.development,
        })
    }

    /// Record cache security events to `audit`
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn manifest(&self) -> &Manifest {
        self.resolver.manifest()
    }

    pub fn generations(&self) -> &GenerationManager {
        &self.generations
    }

    /// Winning manifest entry for a request path
    pub fn resolve(&self, path: &str) -> Option<Candidate> {
        self.resolver.resolve(path)
    }

    /// Precache the whole manifest (install hook)
    pub async fn install<F>(&self, on_progress: F) -> StickyResult<PrecacheReport>
    where
        F: Fn(&str, bool) + Send + Sync,
    {
        if self.development {
            info!("Development mode: skipping precache");
            return Ok(PrecacheReport {
                generation: self.generations.name().to_string(),
                entries: 0,
            });
        }

        let result = self
            .generations
            .precache(self.manifest(), &self.fetcher, on_progress)
            .await;

        match &result {
            Ok(report) => {
                self.audit
                    .log(
                        "cache.generation_activated",
                        &serde_json::json!({
                            "generation": report.generation,
                            "entries": report.entries,
                        }),
                    )
                    .await;
            }
            Err(StickyError::PrecacheIncomplete { source, .. }) => {
                self.audit_failure(source).await;
            }
            Err(_) => {}
        }
        result
    }

    /// Drop stale generations (activate hook)
    pub async fn activate(&self) -> StickyResult<Vec<String>> {
        if self.development {
            return Ok(Vec::new());
        }

        let deleted = self.generations.uncache().await?;
        if !deleted.is_empty() {
            self.audit
                .log(
                    "cache.generations_deleted",
                    &serde_json::json!({
                        "kept": self.generations.name(),
                        "deleted": deleted,
                    }),
                )
                .await;
        }
        Ok(deleted)
    }

    /// Handle one request (fetch hook)
    ///
    /// `None` means the request is not ours and the host should perform it
    /// unmodified.
    pub async fn handle(&self, url: &Url, mode: CacheMode) -> Option<StickyResult<Response>> {
        if self.development {
            return None;
        }
        if url.origin() != self.origin.origin() {
            debug!("Passing through cross-origin request {}", url);
            return None;
        }

        let Some(candidate) = self.resolver.resolve(url.path()) else {
            debug!("Passing through unlisted path {}", url.path());
            return None;
        };
        debug!(
            "{} resolved to {} via {}",
            url.path(),
            candidate.path,
            candidate.rule
        );

        let result = self
            .fetcher
            .get(&candidate, self.generations.name(), mode)
            .await;
        if let Err(e) = &result {
            self.audit_failure(e).await;
        }
        Some(result)
    }

    /// Like `handle`, but errors become responses so an unverified body
    /// can never reach the caller
    pub async fn respond(&self, url: &Url, mode: CacheMode) -> Option<Response> {
        let result = self.handle(url, mode).await?;
        Some(match result {
            Ok(response) => response,
            Err(StickyError::UpstreamUnavailable {
                status: Some(status),
                reason,
                ..
            }) => Response::new(status, reason),
            Err(e) => Response::new(500, e.to_string()),
        })
    }

    async fn audit_failure(&self, error: &StickyError) {
        if let StickyError::IntegrityMismatch {
            url,
            expected,
            received,
        } = error
        {
            self.audit
                .log(
                    "cache.integrity_mismatch",
                    &serde_json::json!({
                        "url": url,
                        "expected": expected,
                        "received": received,
                    }),
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::integrity::{DigestScheme, Integrity};
    use crate::net::MemoryNetwork;
    use tempfile::TempDir;

    fn proxy(network: Arc<MemoryNetwork>, config: &ProxyConfig) -> Proxy {
        let mut manifest = Manifest::new(DigestScheme::TransportIntegrity);
        manifest
            .insert("/index.html", Integrity::compute(b"home", DigestScheme::TransportIntegrity))
            .unwrap();
        manifest
            .insert("/app.js", Integrity::compute(b"app", DigestScheme::TransportIntegrity))
            .unwrap();
        Proxy::new(
            Url::parse("https://example.com").unwrap(),
            manifest,
            config,
            network,
            Arc::new(MemoryCacheStorage::new()),
        )
        .unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn passes_through_foreign_requests() {
        let network = Arc::new(MemoryNetwork::new());
        let proxy = proxy(network.clone(), &ProxyConfig::default());

        assert!(proxy
            .handle(&url("https://cdn.example.net/app.js"), CacheMode::Default)
            .await
            .is_none());
        assert!(proxy
            .handle(&url("https://example.com/unlisted"), CacheMode::Default)
            .await
            .is_none());
        assert_eq!(network.total_hits(), 0);
    }

    #[tokio::test]
    async fn root_is_served_from_index() {
        let network = Arc::new(MemoryNetwork::new());
        network.route("https://example.com/index.html", Response::new(200, "home"));
        let proxy = proxy(network, &ProxyConfig::default());

        let response = proxy
            .handle(&url("https://example.com/"), CacheMode::Default)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.body, b"home");
    }

    #[tokio::test]
    async fn respond_synthesizes_error_responses() {
        let dir = TempDir::new().unwrap();
        let network = Arc::new(MemoryNetwork::new());
        network.route("https://example.com/app.js", Response::new(200, "evil"));
        let proxy = proxy(network, &ProxyConfig::default())
            .with_audit(AuditLog::at(dir.path().join("audit.log")));

        let tampered = proxy
            .respond(&url("https://example.com/app.js"), CacheMode::Default)
            .await
            .unwrap();
        assert_eq!(tampered.status, 500);
        assert_ne!(tampered.body, b"evil");

        let missing = proxy
            .respond(&url("https://example.com/index.html"), CacheMode::Default)
            .await
            .unwrap();
        assert_eq!(missing.status, 404);

        let audit = std::fs::read_to_string(dir.path().join("audit.log")).unwrap();
        assert!(audit.contains("cache.integrity_mismatch"));
    }

    #[tokio::test]
    async fn development_mode_bypasses_everything() {
        let network = Arc::new(MemoryNetwork::new());
        let config = ProxyConfig {
            development: true,
            ..ProxyConfig::default()
        };
        let proxy = proxy(network.clone(), &config);

        let report = proxy.install(|_, _| {}).await.unwrap();
        assert_eq!(report.entries, 0);
        assert!(proxy.activate().await.unwrap().is_empty());
        assert!(proxy
            .handle(&url("https://example.com/app.js"), CacheMode::Default)
            .await
            .is_none());
        assert_eq!(network.total_hits(), 0);
    }

    #[tokio::test]
    async fn install_then_activate() {
        let network = Arc::new(MemoryNetwork::new());
        network.route("https://example.com/index.html", Response::new(200, "home"));
        network.route("https://example.com/app.js", Response::new(200, "app"));
        let proxy = proxy(network.clone(), &ProxyConfig::default());

        assert!(matches!(
            proxy.activate().await,
            Err(StickyError::GenerationNotActive(_))
        ));
        let report = proxy.install(|_, _| {}).await.unwrap();
        assert_eq!(report.entries, 2);
        proxy.activate().await.unwrap();

        // Served from the generation without touching the network again
        network.set_offline(true);
        let response = proxy
            .handle(&url("https://example.com/app.js"), CacheMode::Default)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.body, b"app");
    }
}
