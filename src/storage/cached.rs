use crate::models::{Link, LocationCount, Visit};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache for link lookups
///
/// Links never change after creation, so a cached hit is always current.
/// Misses are not cached: a code unknown here may be created through another
/// process sharing the same database. Visit reads pass straight through.
pub struct CachedStorage {
    inner: Arc<dyn Storage>,
    read_cache: Cache<String, Link>,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, max_cache_entries: u64, ttl_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, read_cache }
    }

    #[cfg(test)]
    fn cached_entries(&self) -> u64 {
        self.read_cache.entry_count()
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn insert_link(&self, link: &Link) -> StorageResult<()> {
        self.inner.insert_link(link).await?;

        self.read_cache
            .insert(link.code.clone(), link.clone())
            .await;

        Ok(())
    }

    async fn get_link(&self, code: &str) -> Result<Option<Link>> {
        if let Some(cached) = self.read_cache.get(code).await {
            return Ok(Some(cached));
        }

        let result = self.inner.get_link(code).await?;
        if let Some(ref link) = result {
            self.read_cache.insert(code.to_string(), link.clone()).await;
        }

        Ok(result)
    }

    async fn list_links(&self, owner: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Link>> {
        self.inner.list_links(owner, limit, offset).await
    }

    async fn count_links(&self) -> Result<i64> {
        self.inner.count_links().await
    }

    async fn insert_visit(&self, visit: &Visit) -> StorageResult<()> {
        self.inner.insert_visit(visit).await
    }

    async fn count_visits(&self, code: Option<&str>) -> Result<i64> {
        self.inner.count_visits(code).await
    }

    async fn visit_counts(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        self.inner.visit_counts(codes).await
    }

    async fn recent_visits(&self, code: Option<&str>, limit: i64) -> Result<Vec<Visit>> {
        self.inner.recent_visits(code, limit).await
    }

    async fn count_unique_locations(&self) -> Result<i64> {
        self.inner.count_unique_locations().await
    }

    async fn top_locations(&self, code: &str, limit: i64) -> Result<Vec<LocationCount>> {
        self.inner.top_locations(code, limit).await
    }
}
