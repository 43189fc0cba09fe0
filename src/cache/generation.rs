//! Cache generations
//!
//! A generation is a named cache holding the verified responses for one
//! manifest. Its name is the configured prefix followed by the manifest
//! fingerprint, so the same manifest always lands in the same generation.
//!
//! # Lifecycle
//!
//! | Step | Operation | Result |
//! |------|-----------|--------|
//! | install | `precache` | every entry fetched and verified, or failure |
//! | activate | `uncache` | older prefixed generations deleted |
//!
//! Precaching is all-or-nothing: a single failed entry fails the install
//! and the generation is never marked active.

use super::{CacheStorage, VerifiedFetcher};
use crate::error::{StickyError, StickyResult};
use crate::manifest::Manifest;
use crate::net::CacheMode;
use crate::resolve::{Candidate, FallbackRule};
use futures_util::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default prefix marking generations this proxy owns
pub const DEFAULT_PREFIX: &str = "#";

/// Entries fetched concurrently while precaching
const PRECACHE_CONCURRENCY: usize = 8;

/// Outcome of a successful precache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheReport {
    pub generation: String,
    pub entries: usize,
}

/// Owns the generation for one manifest
pub struct GenerationManager {
    storage: Arc<dyn CacheStorage>,
    prefix: String,
    name: String,
    active: AtomicBool,
}

impl GenerationManager {
    pub fn new(storage: Arc<dyn CacheStorage>, prefix: &str, manifest: &Manifest) -> Self {
        Self {
            storage,
            prefix: prefix.to_string(),
            name: format!("{}{}", prefix, manifest.fingerprint()),
            active: AtomicBool::new(false),
        }
    }

    /// Name of this manifest's generation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether precache completed in this process
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether a generation name carries our prefix
    pub fn is_owned(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }

    /// Every generation in storage carrying our prefix
    pub async fn owned(&self) -> StickyResult<Vec<String>> {
        Ok(self
            .storage
            .names()
            .await?
            .into_iter()
            .filter(|name| self.is_owned(name))
            .collect())
    }

    /// Fetch and verify every manifest entry into this generation
    ///
    /// `on_progress` is called once per entry with its path and whether it
    /// succeeded.
    pub async fn precache<F>(
        &self,
        manifest: &Manifest,
        fetcher: &VerifiedFetcher,
        on_progress: F,
    ) -> StickyResult<PrecacheReport>
    where
        F: Fn(&str, bool) + Send + Sync,
    {
        self.storage.open(&self.name).await?;
        let total = manifest.len();
        info!(
            "Precaching {} entries into {} ({} storage)",
            total,
            self.name,
            self.storage.name()
        );

        let on_progress = &on_progress;
        let results: Vec<StickyResult<()>> = stream::iter(manifest.entries())
            .map(|entry| async move {
                let candidate = Candidate {
                    path: entry.path,
                    integrity: entry.integrity,
                    rule: FallbackRule::Exact,
                };
                let result = fetcher
                    .get(&candidate, &self.name, CacheMode::Default)
                    .await
                    .map(|_| ());
                on_progress(&candidate.path, result.is_ok());
                result
            })
            .buffer_unordered(PRECACHE_CONCURRENCY)
            .collect()
            .await;

        let mut errors: Vec<StickyError> = results.into_iter().filter_map(Result::err).collect();
        if !errors.is_empty() {
            let failed = errors.len();
            for error in &errors {
                warn!("Precache entry failed: {}", error);
            }
            // Surface a security failure ahead of an operational one
            let first = errors
                .iter()
                .position(StickyError::is_security)
                .unwrap_or(0);
            return Err(StickyError::PrecacheIncomplete {
                failed,
                total,
                source: Box::new(errors.swap_remove(first)),
            });
        }

        self.active.store(true, Ordering::SeqCst);
        info!("Generation {} is complete", self.name);
        Ok(PrecacheReport {
            generation: self.name.clone(),
            entries: total,
        })
    }

    /// Delete every other generation carrying our prefix
    ///
    /// Only valid once this generation is active. Generations without the
    /// prefix belong to someone else and are left alone.
    pub async fn uncache(&self) -> StickyResult<Vec<String>> {
        if !self.is_active() {
            return Err(StickyError::GenerationNotActive(self.name.clone()));
        }

        let mut deleted = Vec::new();
        for name in self.owned().await? {
            if name == self.name {
                continue;
            }
            if self.storage.delete(&name).await? {
                debug!("Deleted stale generation {}", name);
                deleted.push(name);
            }
        }

        if !deleted.is_empty() {
            info!("Removed {} stale generation(s)", deleted.len());
        }
        Ok(deleted)
    }
}
