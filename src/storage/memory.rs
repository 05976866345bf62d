//! In-memory storage
//!
//! Everything is lost on shutdown. Used by tests and `DATABASE_BACKEND=memory`.

use crate::models::{Link, LocationCount, Visit};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

struct StoredLink {
    /// Insertion order, breaks ties between links created in the same second
    seq: u64,
    link: Link,
}

#[derive(Default)]
struct VisitLog {
    visits: Vec<Visit>,
    ids: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStorage {
    links: DashMap<String, StoredLink>,
    next_seq: AtomicU64,
    visits: RwLock<VisitLog>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn has_city(visit: &Visit) -> bool {
    visit.city.as_deref().is_some_and(|city| !city.is_empty())
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_link(&self, link: &Link) -> StorageResult<()> {
        match self.links.entry(link.code.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict),
            Entry::Vacant(entry) => {
                entry.insert(StoredLink {
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    link: link.clone(),
                });
                Ok(())
            }
        }
    }

    async fn get_link(&self, code: &str) -> Result<Option<Link>> {
        Ok(self.links.get(code).map(|entry| entry.link.clone()))
    }

    async fn list_links(&self, owner: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Link>> {
        let mut matching: Vec<(i64, u64, Link)> = self
            .links
            .iter()
            .filter(|entry| owner.is_none() || entry.link.owner.as_deref() == owner)
            .map(|entry| (entry.link.created_at, entry.seq, entry.link.clone()))
            .collect();

        matching.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));

        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(_, _, link)| link)
            .collect())
    }

    async fn count_links(&self) -> Result<i64> {
        Ok(self.links.len() as i64)
    }

    async fn insert_visit(&self, visit: &Visit) -> StorageResult<()> {
        let mut log = self.visits.write().await;
        if !log.ids.insert(visit.id.clone()) {
            return Err(StorageError::Conflict);
        }
        log.visits.push(visit.clone());
        Ok(())
    }

    async fn count_visits(&self, code: Option<&str>) -> Result<i64> {
        let log = self.visits.read().await;
        let count = match code {
            Some(code) => log.visits.iter().filter(|v| v.code == code).count(),
            None => log.visits.len(),
        };
        Ok(count as i64)
    }

    async fn visit_counts(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();
        let log = self.visits.read().await;

        let mut counts = HashMap::new();
        for visit in log.visits.iter().filter(|v| wanted.contains(v.code.as_str())) {
            *counts.entry(visit.code.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn recent_visits(&self, code: Option<&str>, limit: i64) -> Result<Vec<Visit>> {
        let log = self.visits.read().await;

        // The log is append-only, so reverse insertion order breaks timestamp ties
        let mut visits: Vec<&Visit> = log
            .visits
            .iter()
            .rev()
            .filter(|v| code.is_none_or(|code| v.code == code))
            .collect();
        visits.sort_by(|a, b| b.visited_at.cmp(&a.visited_at));

        Ok(visits
            .into_iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_unique_locations(&self) -> Result<i64> {
        let log = self.visits.read().await;
        let unique: HashSet<(&str, Option<&str>)> = log
            .visits
            .iter()
            .filter(|v| has_city(v))
            .map(|v| (v.city.as_deref().unwrap_or_default(), v.country.as_deref()))
            .collect();
        Ok(unique.len() as i64)
    }

    async fn top_locations(&self, code: &str, limit: i64) -> Result<Vec<LocationCount>> {
        let log = self.visits.read().await;

        let mut grouped: HashMap<(String, Option<String>), i64> = HashMap::new();
        for visit in log.visits.iter().filter(|v| v.code == code && has_city(v)) {
            let key = (visit.city.clone().unwrap_or_default(), visit.country.clone());
            *grouped.entry(key).or_insert(0) += 1;
        }

        let mut locations: Vec<LocationCount> = grouped
            .into_iter()
            .map(|((city, country), visits)| LocationCount {
                city,
                country,
                visits,
            })
            .collect();
        locations.sort_by(|a, b| b.visits.cmp(&a.visits).then_with(|| a.city.cmp(&b.city)));
        locations.truncate(limit.max(0) as usize);

        Ok(locations)
    }
}
