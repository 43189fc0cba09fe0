//! Verified fetch
//!
//! Every response that leaves this module, whether from the cache or the
//! network, matches its manifest digest. Order of operations:
//!
//! 1. Serve from the generation unless the caller asked for a reload
//! 2. Fetch from the origin, bypassing HTTP caches, with the transport
//!    integrity constraint attached when the scheme allows it
//! 3. On a non-success status, retry once at the canonical form of
//!    `/index.html` or `.html` URLs; otherwise report the original status
//! 4. Strip transfer metadata
//! 5. Hash the body locally and reject mismatches
//! 6. Store and return

use super::CacheStorage;
use crate::error::{StickyError, StickyResult};
use crate::integrity::Integrity;
use crate::net::{CacheMode, Network, Request, Response};
use crate::resolve::Candidate;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Canonical form a static host may serve instead of `url`
///
/// `/docs/index.html` → `/docs`, `/about.html` → `/about`.
pub fn fallback_url(url: &Url) -> Option<Url> {
    let path = url.path();
    let rewritten = if let Some(parent) = path.strip_suffix("/index.html") {
        parent
    } else if let Some(stem) = path.strip_suffix(".html") {
        stem
    } else {
        return None;
    };

    let mut fallback = url.clone();
    fallback.set_path(if rewritten.is_empty() { "/" } else { rewritten });
    Some(fallback)
}

/// Fetches manifest entries and stores only verified responses
pub struct VerifiedFetcher {
    network: Arc<dyn Network>,
    storage: Arc<dyn CacheStorage>,
    origin: Url,
}

impl VerifiedFetcher {
    pub fn new(network: Arc<dyn Network>, storage: Arc<dyn CacheStorage>, origin: Url) -> Self {
        Self {
            network,
            storage,
            origin,
        }
    }

    /// Origin that manifest paths are relative to
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Backing storage
    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Absolute URL of a manifest path
    pub fn url_for(&self, path: &str) -> StickyResult<Url> {
        self.origin.join(path).map_err(|e| StickyError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Verified response for a resolved candidate
    pub async fn get(
        &self,
        candidate: &Candidate,
        generation: &str,
        mode: CacheMode,
    ) -> StickyResult<Response> {
        let url = self.url_for(&candidate.path)?;
        let key = url.as_str();

        if mode != CacheMode::Reload {
            if let Some(cached) = self.storage.lookup(generation, key).await? {
                debug!("Cache hit for {} in {}", key, generation);
                return Ok(cached);
            }
        }

        let response = self.fetch_with_fallback(&url, &candidate.integrity).await?;

        if let Err(received) = candidate.integrity.verify(&response.body) {
            warn!("Integrity mismatch for {}, discarding response", key);
            return Err(StickyError::IntegrityMismatch {
                url: key.to_string(),
                expected: candidate.integrity.token().to_string(),
                received,
            });
        }

        self.storage.put(generation, key, &response).await?;
        debug!("Stored {} in {} ({})", key, generation, self.storage.name());
        Ok(response)
    }

    async fn fetch_once(&self, url: &Url, integrity: &Integrity) -> StickyResult<Response> {
        let request = Request::new(url.clone())
            .with_cache(CacheMode::Reload)
            .with_integrity(integrity.transport_token());
        debug!(
            "Fetching {} over {} (integrity checked {})",
            url,
            self.network.name(),
            if self.network.enforces_integrity() && integrity.transport_token().is_some() {
                "by transport and locally"
            } else {
                "locally"
            }
        );
        Ok(self.network.fetch(&request).await?.cleaned())
    }

    async fn fetch_with_fallback(&self, url: &Url, integrity: &Integrity) -> StickyResult<Response> {
        let direct = self.fetch_once(url, integrity).await?;
        if direct.is_success() {
            return Ok(direct);
        }

        let Some(fallback) = fallback_url(url) else {
            return Err(StickyError::upstream_status(url.as_str(), direct.status));
        };

        debug!(
            "{} returned {}, retrying as {}",
            url, direct.status, fallback
        );
        let retried = self.fetch_once(&fallback, integrity).await?;
        if retried.is_success() {
            Ok(retried)
        } else {
            Err(StickyError::upstream_status(url.as_str(), direct.status))
        }
    }
}
