//! In-memory origin
//!
//! Serves a fixed route table and counts every request, so callers can
//! assert exactly when the network was (or was not) touched.

use super::{Network, Request, Response};
use crate::error::{StickyError, StickyResult};
use crate::integrity::{DigestScheme, Integrity};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use url::Url;

/// Route-table network used by tests and offline drills
#[derive(Default)]
pub struct MemoryNetwork {
    routes: RwLock<HashMap<String, Response>>,
    hits: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
    enforce_integrity: bool,
}

fn canonical(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl MemoryNetwork {
    /// Create an empty origin (every URL is a 404)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an origin that rejects integrity mismatches itself
    pub fn enforcing() -> Self {
        Self {
            enforce_integrity: true,
            ..Self::default()
        }
    }

    /// Serve `response` at `url`, replacing any previous route
    pub fn route(&self, url: &str, response: Response) {
        if let Ok(mut routes) = self.routes.write() {
            routes.insert(canonical(url), response);
        }
    }

    /// Stop serving `url`
    pub fn remove(&self, url: &str) {
        if let Ok(mut routes) = self.routes.write() {
            routes.remove(&canonical(url));
        }
    }

    /// Simulate a network outage
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Requests made for one URL
    pub fn hits(&self, url: &str) -> usize {
        self.hits
            .lock()
            .map(|hits| hits.get(&canonical(url)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Requests made overall
    pub fn total_hits(&self) -> usize {
        self.hits
            .lock()
            .map(|hits| hits.values().sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    async fn fetch(&self, request: &Request) -> StickyResult<Response> {
        let key = request.url.to_string();
        if let Ok(mut hits) = self.hits.lock() {
            *hits.entry(key.clone()).or_insert(0) += 1;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(StickyError::unreachable(key, "network offline"));
        }

        let response = self
            .routes
            .read()
            .map_err(|_| StickyError::Internal("route table poisoned".to_string()))?
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "Not Found"));

        if self.enforce_integrity && response.is_success() {
            if let Some(token) = &request.integrity {
                let integrity = Integrity::parse(token, DigestScheme::TransportIntegrity)?;
                if let Err(received) = integrity.verify(&response.body) {
                    return Err(StickyError::IntegrityMismatch {
                        url: key,
                        expected: token.clone(),
                        received,
                    });
                }
            }
        }

        Ok(response)
    }

    fn enforces_integrity(&self) -> bool {
        self.enforce_integrity
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
