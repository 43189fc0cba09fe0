//! Cache storage abstraction
//!
//! A storage holds named generations, each mapping a request key (the
//! absolute URL) to a stored response. Mirrors the host cache API: a
//! generation is created on first write and removed as a whole.

use crate::error::StickyResult;
use crate::net::Response;
use async_trait::async_trait;

/// Named-generation response store
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every generation present
    async fn names(&self) -> StickyResult<Vec<String>>;

    /// Whether a generation exists
    async fn has(&self, generation: &str) -> StickyResult<bool>;

    /// Create a generation if it does not exist yet
    async fn open(&self, generation: &str) -> StickyResult<()>;

    /// Remove a generation and everything in it; returns whether it existed
    async fn delete(&self, generation: &str) -> StickyResult<bool>;

    /// Stored response for `key`, if any
    async fn lookup(&self, generation: &str, key: &str) -> StickyResult<Option<Response>>;

    /// Store a response under `key`, creating the generation if needed
    async fn put(&self, generation: &str, key: &str, response: &Response) -> StickyResult<()>;

    /// Keys stored in a generation
    async fn keys(&self, generation: &str) -> StickyResult<Vec<String>>;

    /// Storage backend name
    fn name(&self) -> &'static str;
}
