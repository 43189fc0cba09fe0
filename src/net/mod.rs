//! Network access
//!
//! The proxy only ever talks to its origin through the `Network` trait so
//! that the cache and update logic run unchanged against a real HTTP
//! client or an in-memory route table.

mod http;
mod memory;

pub use http::HttpNetwork;
pub use memory::MemoryNetwork;

use crate::error::{StickyError, StickyResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use url::Url;

/// Headers that describe one transfer rather than the resource itself
const TRANSIENT_HEADERS: &[&str] = &[
    "age",
    "connection",
    "date",
    "keep-alive",
    "set-cookie",
    "transfer-encoding",
];

/// Whether a request may be answered by intermediate HTTP caches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Local generation first, network on miss
    #[default]
    Default,
    /// Skip every cache and go to the origin
    Reload,
}

/// Outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub cache: CacheMode,
    /// Transport integrity constraint, when the digest scheme supports it
    pub integrity: Option<String>,
}

impl Request {
    /// Create a request with the default cache mode
    pub fn new(url: Url) -> Self {
        Self {
            url,
            cache: CacheMode::Default,
            integrity: None,
        }
    }

    /// Parse a URL string into a request
    pub fn parse(url: &str) -> StickyResult<Self> {
        let url = Url::parse(url).map_err(|e| StickyError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(url))
    }

    /// Set the cache mode
    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Attach a transport integrity constraint
    pub fn with_integrity(mut self, integrity: Option<&str>) -> Self {
        self.integrity = integrity.map(str::to_string);
        self
    }

    /// Identity used as cache key
    pub fn key(&self) -> &str {
        self.url.as_str()
    }
}

/// Response as seen by the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Lowercase header names
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    /// Final URL after redirects, if the transport reports it
    pub url: Option<String>,
    pub redirected: bool,
}

impl Response {
    /// Create a response with no headers
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
            url: None,
            redirected: false,
        }
    }

    /// Add a header (name is lowercased)
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drop transfer metadata so identical content compares equal
    /// regardless of how it was retrieved
    pub fn cleaned(mut self) -> Self {
        self.url = None;
        self.redirected = false;
        self.headers
            .retain(|name, _| !TRANSIENT_HEADERS.contains(&name.as_str()));
        self
    }
}

/// Transport to the origin
///
/// Implementations return `Err` only when no response was received;
/// non-success statuses come back as ordinary responses.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform one request
    async fn fetch(&self, request: &Request) -> StickyResult<Response>;

    /// Whether the transport rejects bodies that fail `Request::integrity`
    fn enforces_integrity(&self) -> bool {
        false
    }

    /// Human-readable transport name
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaned_drops_transfer_metadata() {
        let mut response = Response::new(200, "body")
            .with_header("Date", "Tue, 01 Jan 2030 00:00:00 GMT")
            .with_header("Content-Type", "text/html")
            .with_header("Set-Cookie", "a=b");
        response.redirected = true;
        response.url = Some("https://example.com/final".to_string());

        let cleaned = response.cleaned();
        assert!(!cleaned.redirected);
        assert!(cleaned.url.is_none());
        assert!(cleaned.header("date").is_none());
        assert!(cleaned.header("set-cookie").is_none());
        assert_eq!(cleaned.header("content-type"), Some("text/html"));
    }

    #[test]
    fn cleaned_responses_compare_equal() {
        let direct = Response::new(200, "same").with_header("date", "one");
        let mut redirected = Response::new(200, "same").with_header("date", "two");
        redirected.redirected = true;

        assert_ne!(direct, redirected);
        assert_eq!(direct.cleaned(), redirected.cleaned());
    }

    #[test]
    fn success_range() {
        assert!(Response::new(200, "").is_success());
        assert!(Response::new(204, "").is_success());
        assert!(!Response::new(304, "").is_success());
        assert!(!Response::new(404, "").is_success());
    }

    #[test]
    fn request_builders() {
        let request = Request::parse("https://example.com/app.js")
            .unwrap()
            .with_cache(CacheMode::Reload)
            .with_integrity(Some("sha256-abc"));

        assert_eq!(request.key(), "https://example.com/app.js");
        assert_eq!(request.cache, CacheMode::Reload);
        assert_eq!(request.integrity.as_deref(), Some("sha256-abc"));
        assert!(Request::parse("not a url").is_err());
    }
}
