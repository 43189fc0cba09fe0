//! In-memory cache storage

use super::CacheStorage;
use crate::error::StickyResult;
use crate::net::Response;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

type Generation = BTreeMap<String, Response>;

/// Cache storage that lives for the lifetime of the process
#[derive(Default)]
pub struct MemoryCacheStorage {
    generations: RwLock<BTreeMap<String, Generation>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn names(&self) -> StickyResult<Vec<String>> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn has(&self, generation: &str) -> StickyResult<bool> {
        Ok(self.generations.read().await.contains_key(generation))
    }

    async fn open(&self, generation: &str) -> StickyResult<()> {
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default();
        Ok(())
    }

    async fn delete(&self, generation: &str) -> StickyResult<bool> {
        Ok(self.generations.write().await.remove(generation).is_some())
    }

    async fn lookup(&self, generation: &str, key: &str) -> StickyResult<Option<Response>> {
        Ok(self
            .generations
            .read()
            .await
            .get(generation)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, generation: &str, key: &str, response: &Response) -> StickyResult<()> {
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default()
            .insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn keys(&self, generation: &str) -> StickyResult<Vec<String>> {
        Ok(self
            .generations
            .read()
            .await
            .get(generation)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
