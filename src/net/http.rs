//! HTTP transport backed by a blocking `ureq` agent
//!
//! Each request runs on tokio's blocking pool so the async runtime is
//! never stalled by socket I/O.

use super::{CacheMode, Network, Request, Response};
use crate::error::{StickyError, StickyResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;
use ureq::ResponseExt;

/// Largest body accepted from the origin
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Real network access over HTTP(S)
#[derive(Clone)]
pub struct HttpNetwork {
    agent: ureq::Agent,
}

impl HttpNetwork {
    /// Create an agent that follows redirects and reports every status
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .user_agent(concat!("sticky/", env!("CARGO_PKG_VERSION")))
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn fetch_blocking(agent: &ureq::Agent, request: &Request) -> StickyResult<Response> {
    let url = request.url.as_str();

    let mut builder = agent.get(url);
    if request.cache == CacheMode::Reload {
        builder = builder
            .header("cache-control", "no-cache")
            .header("pragma", "no-cache");
    }

    let mut response = builder
        .call()
        .map_err(|e| StickyError::unreachable(url, e.to_string()))?;

    let status = response.status().as_u16();
    let final_url = response.get_uri().to_string();

    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }

    let body = response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()
        .map_err(|e| StickyError::unreachable(url, format!("reading body: {}", e)))?;

    Ok(Response {
        status,
        headers,
        body,
        redirected: final_url != url,
        url: Some(final_url),
    })
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> StickyResult<Response> {
        debug!("GET {} ({:?})", request.url, request.cache);

        let agent = self.agent.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &request))
            .await
            .map_err(|e| StickyError::Internal(format!("fetch task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
