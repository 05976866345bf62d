//! On-demand statistics over links and visits
//!
//! Nothing is cached: every call recomputes from the stored records, so a
//! figure can never drift away from the data it summarizes.

use std::sync::Arc;
use std::time::Duration;

use crate::analytics::models::{GlobalStats, LinkStats};
use crate::error::RegistryError;
use crate::models::{Link, LinkResponse, Visit};
use crate::registry::{bounded, LinkRegistry};
use crate::storage::Storage;

const TOP_LOCATIONS_LIMIT: i64 = 10;

pub struct Aggregator {
    registry: Arc<LinkRegistry>,
    storage: Arc<dyn Storage>,
    storage_timeout: Duration,
    recent_visits_limit: i64,
}

impl Aggregator {
    pub fn new(
        registry: Arc<LinkRegistry>,
        storage: Arc<dyn Storage>,
        storage_timeout: Duration,
        recent_visits_limit: i64,
    ) -> Self {
        Self {
            registry,
            storage,
            storage_timeout,
            recent_visits_limit,
        }
    }

    pub async fn global_stats(&self) -> Result<GlobalStats, RegistryError> {
        let (total_links, total_visits, unique_locations) = tokio::try_join!(
            bounded(self.storage_timeout, self.storage.count_links()),
            bounded(self.storage_timeout, self.storage.count_visits(None)),
            bounded(self.storage_timeout, self.storage.count_unique_locations()),
        )?;

        Ok(GlobalStats {
            total_links,
            total_visits,
            unique_locations,
        })
    }

    /// Stats for one link. Expired links still have stats; unknown codes are `NotFound`.
    pub async fn link_stats(&self, code: &str) -> Result<LinkStats, RegistryError> {
        let link = self.registry.get(code).await?;

        let (visit_count, recent_visits, top_locations) = tokio::try_join!(
            bounded(self.storage_timeout, self.storage.count_visits(Some(link.code.as_str()))),
            bounded(
                self.storage_timeout,
                self.storage
                    .recent_visits(Some(link.code.as_str()), self.recent_visits_limit)
            ),
            bounded(
                self.storage_timeout,
                self.storage.top_locations(&link.code, TOP_LOCATIONS_LIMIT)
            ),
        )?;

        Ok(LinkStats {
            code: link.code,
            visit_count,
            recent_visits,
            top_locations,
        })
    }

    /// Latest visits across all links, newest first
    pub async fn recent_activity(&self, limit: Option<i64>) -> Result<Vec<Visit>, RegistryError> {
        let limit = limit.unwrap_or(self.recent_visits_limit).clamp(1, 100);
        bounded(self.storage_timeout, self.storage.recent_visits(None, limit)).await
    }

    /// Links newest first, each with its recomputed visit count
    pub async fn list_with_clicks(
        &self,
        owner: Option<&str>,
        limit: i64,
        offset: i64,
        redirect_base_url: &str,
    ) -> Result<Vec<LinkResponse>, RegistryError> {
        let links: Vec<Link> = self.registry.list(owner, limit, offset).await?;
        let codes: Vec<String> = links.iter().map(|link| link.code.clone()).collect();
        let counts = bounded(self.storage_timeout, self.storage.visit_counts(&codes)).await?;

        Ok(links
            .into_iter()
            .map(|link| {
                let clicks = counts.get(&link.code).copied().unwrap_or(0);
                LinkResponse::new(link, redirect_base_url).with_clicks(clicks)
            })
            .collect())
    }
}
