use crate::models::{Link, LocationCount, Visit};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// A record with the same key already exists
    #[error("record already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, indexes, etc.)
    async fn init(&self) -> Result<()>;

    /// Insert a link, failing with `StorageError::Conflict` if its code is taken
    async fn insert_link(&self, link: &Link) -> StorageResult<()>;

    /// Get a link by short code, expired or not
    async fn get_link(&self, code: &str) -> Result<Option<Link>>;

    /// List links, newest first, optionally restricted to one owner
    async fn list_links(&self, owner: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Link>>;

    async fn count_links(&self) -> Result<i64>;

    /// Append a visit, failing with `StorageError::Conflict` if its id was already stored
    async fn insert_visit(&self, visit: &Visit) -> StorageResult<()>;

    /// Count visits for one link, or across all links
    async fn count_visits(&self, code: Option<&str>) -> Result<i64>;

    /// Visit counts keyed by short code; codes without visits are absent
    async fn visit_counts(&self, codes: &[String]) -> Result<HashMap<String, i64>>;

    /// Most recent visits first, for one link or across all links
    async fn recent_visits(&self, code: Option<&str>, limit: i64) -> Result<Vec<Visit>>;

    /// Number of distinct (city, country) pairs among visits with a city
    async fn count_unique_locations(&self) -> Result<i64>;

    /// Per-link visit counts grouped by (city, country), busiest first
    async fn top_locations(&self, code: &str, limit: i64) -> Result<Vec<LocationCount>>;
}
