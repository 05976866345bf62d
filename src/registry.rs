//! Link registry: creation, lookup and expiry of short links

use anyhow::anyhow;
use rand::RngExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::models::Link;
use crate::storage::{Storage, StorageError};

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const SECONDS_PER_DAY: i64 = 86_400;

/// Input for [`LinkRegistry::create`]
#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub original_url: String,
    pub title: Option<String>,
    pub expiry_days: Option<u32>,
    pub owner: Option<String>,
}

pub struct LinkRegistry {
    storage: Arc<dyn Storage>,
    config: RegistryConfig,
}

/// Generate a random alphanumeric short code
fn generate_short_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Accept only absolute http(s) URLs with a host
pub fn validate_destination(raw: &str) -> Result<(), RegistryError> {
    // The URL parser drops tabs and newlines, but the raw string is what gets stored
    if raw.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(RegistryError::InvalidUrl(
            "URL must not contain whitespace or control characters".to_string(),
        ));
    }

    let parsed = Url::parse(raw)
        .map_err(|e| RegistryError::InvalidUrl(format!("'{raw}' is not an absolute URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RegistryError::InvalidUrl(format!(
            "unsupported scheme '{}', expected http or https",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(RegistryError::InvalidUrl(format!("'{raw}' has no host")));
    }

    Ok(())
}

/// Run a storage call under `limit`, mapping timeouts and backend errors to `StorageUnavailable`
pub(crate) async fn bounded<T, E, F>(limit: Duration, call: F) -> Result<T, RegistryError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<anyhow::Error>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(RegistryError::StorageUnavailable(err.into())),
        Err(_) => Err(RegistryError::StorageUnavailable(anyhow!(
            "storage call timed out after {limit:?}"
        ))),
    }
}

impl LinkRegistry {
    pub fn new(storage: Arc<dyn Storage>, config: RegistryConfig) -> Self {
        Self { storage, config }
    }

    /// Create a link under a freshly generated short code
    ///
    /// Uniqueness is enforced by the store; a collision just draws another code,
    /// up to `max_attempts` times.
    pub async fn create(&self, new_link: NewLink) -> Result<Link, RegistryError> {
        let original_url = new_link.original_url.trim().to_string();
        validate_destination(&original_url)?;

        let title = new_link
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let owner = new_link.owner.filter(|o| !o.is_empty());
        let limit = self.config.storage_timeout();

        for attempt in 1..=self.config.max_attempts {
            let created_at = chrono::Utc::now().timestamp();
            let link = Link {
                code: generate_short_code(self.config.code_length),
                original_url: original_url.clone(),
                title: title.clone(),
                created_at,
                expires_at: new_link
                    .expiry_days
                    .map(|days| created_at + i64::from(days) * SECONDS_PER_DAY),
                owner: owner.clone(),
            };

            match tokio::time::timeout(limit, self.storage.insert_link(&link)).await {
                Ok(Ok(())) => {
                    info!(code = %link.code, owner = ?link.owner, "created link");
                    return Ok(link);
                }
                Ok(Err(StorageError::Conflict)) => {
                    warn!(attempt, code = %link.code, "short code collision, drawing another");
                }
                Ok(Err(StorageError::Other(err))) => {
                    return Err(RegistryError::StorageUnavailable(err));
                }
                Err(_) => {
                    return Err(RegistryError::StorageUnavailable(anyhow!(
                        "link insert timed out after {limit:?}"
                    )));
                }
            }
        }

        error!(
            attempts = self.config.max_attempts,
            code_length = self.config.code_length,
            "could not find a free short code"
        );
        Err(RegistryError::StorageUnavailable(anyhow!(
            "no free short code after {} attempts",
            self.config.max_attempts
        )))
    }

    /// Look up a link for redirecting: unknown codes are `NotFound`, expired links `Expired`
    pub async fn resolve(&self, code: &str) -> Result<Link, RegistryError> {
        let link = self.get(code).await?;

        if link.is_expired_at(chrono::Utc::now().timestamp()) {
            debug!(code, expires_at = ?link.expires_at, "link expired");
            return Err(RegistryError::Expired);
        }

        Ok(link)
    }

    /// Look up a link regardless of expiry
    pub async fn get(&self, code: &str) -> Result<Link, RegistryError> {
        bounded(self.config.storage_timeout(), self.storage.get_link(code))
            .await?
            .ok_or(RegistryError::NotFound)
    }

    /// Links newest first
    pub async fn list(
        &self,
        owner: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Link>, RegistryError> {
        bounded(
            self.config.storage_timeout(),
            self.storage.list_links(owner, limit, offset),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationCount, Visit};
    use crate::storage::{MemoryStorage, StorageResult};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn registry_with(storage: Arc<dyn Storage>) -> LinkRegistry {
        LinkRegistry::new(storage, RegistryConfig::default())
    }

    fn registry() -> LinkRegistry {
        registry_with(Arc::new(MemoryStorage::new()))
    }

    fn new_link(url: &str) -> NewLink {
        NewLink {
            original_url: url.to_string(),
            ..Default::default()
        }
    }

    /// Reports a conflict for the first `conflicts` inserts
    struct CollidingStorage {
        inner: MemoryStorage,
        conflicts: u32,
        seen: AtomicU32,
    }

    #[async_trait]
    impl Storage for CollidingStorage {
        async fn init(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn insert_link(&self, link: &Link) -> StorageResult<()> {
            if self.seen.fetch_add(1, Ordering::SeqCst) < self.conflicts {
                return Err(StorageError::Conflict);
            }
            self.inner.insert_link(link).await
        }
        async fn get_link(&self, code: &str) -> anyhow::Result<Option<Link>> {
            self.inner.get_link(code).await
        }
        async fn list_links(
            &self,
            owner: Option<&str>,
            limit: i64,
            offset: i64,
        ) -> anyhow::Result<Vec<Link>> {
            self.inner.list_links(owner, limit, offset).await
        }
        async fn count_links(&self) -> anyhow::Result<i64> {
            self.inner.count_links().await
        }
        async fn insert_visit(&self, visit: &Visit) -> StorageResult<()> {
            self.inner.insert_visit(visit).await
        }
        async fn count_visits(&self, code: Option<&str>) -> anyhow::Result<i64> {
            self.inner.count_visits(code).await
        }
        async fn visit_counts(&self, codes: &[String]) -> anyhow::Result<HashMap<String, i64>> {
            self.inner.visit_counts(codes).await
        }
        async fn recent_visits(&self, code: Option<&str>, limit: i64) -> anyhow::Result<Vec<Visit>> {
            self.inner.recent_visits(code, limit).await
        }
        async fn count_unique_locations(&self) -> anyhow::Result<i64> {
            self.inner.count_unique_locations().await
        }
        async fn top_locations(&self, code: &str, limit: i64) -> anyhow::Result<Vec<LocationCount>> {
            self.inner.top_locations(code, limit).await
        }
    }

    #[test]
    fn test_generate_short_code_alphabet() {
        let code = generate_short_code(12);
        assert_eq!(code.len(), 12);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_validate_destination() {
        assert!(validate_destination("https://example.com").is_ok());
        assert!(validate_destination("http://localhost:8080/path?q=1").is_ok());

        for bad in [
            "",
            "example.com",
            "/relative/path",
            "ftp://example.com",
            "javascript:alert(1)",
            "mailto:a@b.c",
            "https://example.com/a\nb",
            "https://exa\tmple.com/",
            "https://example.com/a b",
            "https://example.com/\u{7f}",
        ] {
            assert!(
                matches!(validate_destination(bad), Err(RegistryError::InvalidUrl(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_create_then_resolve_keeps_original_url() {
        let registry = registry();

        for url in [
            "https://example.com",
            "https://example.com/a/b?x=1&y=two#frag",
            "http://sub.example.org:8443/",
            "https://例え.jp/パス",
        ] {
            let link = registry.create(new_link(url)).await.unwrap();
            let resolved = registry.resolve(&link.code).await.unwrap();
            assert_eq!(resolved.original_url, url);
            assert_eq!(resolved, link);
        }
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_url() {
        let registry = registry();
        let result = registry.create(new_link("not a url")).await;
        assert!(matches!(result, Err(RegistryError::InvalidUrl(_))));
        assert!(registry.list(None, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_trims_but_rejects_interior_line_breaks() {
        let registry = registry();

        let link = registry.create(new_link("\thttps://example.com/ok\n")).await.unwrap();
        assert_eq!(link.original_url, "https://example.com/ok");

        let result = registry.create(new_link("https://example.com/a\r\nb")).await;
        assert!(matches!(result, Err(RegistryError::InvalidUrl(_))));
        assert_eq!(registry.list(None, 10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_sets_expiry_and_normalizes_title() {
        let registry = registry();
        let link = registry
            .create(NewLink {
                original_url: "https://example.com".to_string(),
                title: Some("   ".to_string()),
                expiry_days: Some(7),
                owner: Some("alice".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(link.title, None);
        assert_eq!(link.expires_at, Some(link.created_at + 7 * SECONDS_PER_DAY));
        assert_eq!(link.owner.as_deref(), Some("alice"));

        let permanent = registry.create(new_link("https://example.com")).await.unwrap();
        assert_eq!(permanent.expires_at, None);
    }

    #[tokio::test]
    async fn test_resolve_unknown_code_is_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("never-used").await,
            Err(RegistryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_resolve_expired_link_is_expired_not_not_found() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let registry = registry_with(Arc::clone(&storage));

        storage
            .insert_link(&Link {
                code: "old".to_string(),
                original_url: "https://example.com".to_string(),
                title: None,
                created_at: 1_000,
                expires_at: Some(2_000),
                owner: None,
            })
            .await
            .unwrap();

        assert!(matches!(
            registry.resolve("old").await,
            Err(RegistryError::Expired)
        ));
        // Still visible when expiry does not matter
        assert_eq!(registry.get("old").await.unwrap().code, "old");
    }

    #[tokio::test]
    async fn test_zero_expiry_days_expires_immediately() {
        let registry = registry();
        let mut new = new_link("https://example.com");
        new.expiry_days = Some(0);

        let link = registry.create(new).await.unwrap();
        assert!(matches!(
            registry.resolve(&link.code).await,
            Err(RegistryError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_create_retries_on_collision() {
        let storage = Arc::new(CollidingStorage {
            inner: MemoryStorage::new(),
            conflicts: 3,
            seen: AtomicU32::new(0),
        });
        let registry = registry_with(storage.clone());

        let link = registry.create(new_link("https://example.com")).await.unwrap();
        assert_eq!(storage.seen.load(Ordering::SeqCst), 4);
        assert!(registry.resolve(&link.code).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_gives_up_after_max_attempts() {
        let storage = Arc::new(CollidingStorage {
            inner: MemoryStorage::new(),
            conflicts: u32::MAX,
            seen: AtomicU32::new(0),
        });
        let registry = registry_with(storage.clone());

        let result = registry.create(new_link("https://example.com")).await;
        assert!(matches!(result, Err(RegistryError::StorageUnavailable(_))));
        assert_eq!(
            storage.seen.load(Ordering::SeqCst),
            RegistryConfig::default().max_attempts
        );
    }

    /// Holds every lookup far longer than any sane storage timeout
    struct StalledStorage {
        inner: MemoryStorage,
    }

    #[async_trait]
    impl Storage for StalledStorage {
        async fn init(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn insert_link(&self, link: &Link) -> StorageResult<()> {
            self.inner.insert_link(link).await
        }
        async fn get_link(&self, code: &str) -> anyhow::Result<Option<Link>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            self.inner.get_link(code).await
        }
        async fn list_links(
            &self,
            owner: Option<&str>,
            limit: i64,
            offset: i64,
        ) -> anyhow::Result<Vec<Link>> {
            self.inner.list_links(owner, limit, offset).await
        }
        async fn count_links(&self) -> anyhow::Result<i64> {
            self.inner.count_links().await
        }
        async fn insert_visit(&self, visit: &Visit) -> StorageResult<()> {
            self.inner.insert_visit(visit).await
        }
        async fn count_visits(&self, code: Option<&str>) -> anyhow::Result<i64> {
            self.inner.count_visits(code).await
        }
        async fn visit_counts(&self, codes: &[String]) -> anyhow::Result<HashMap<String, i64>> {
            self.inner.visit_counts(codes).await
        }
        async fn recent_visits(&self, code: Option<&str>, limit: i64) -> anyhow::Result<Vec<Visit>> {
            self.inner.recent_visits(code, limit).await
        }
        async fn count_unique_locations(&self) -> anyhow::Result<i64> {
            self.inner.count_unique_locations().await
        }
        async fn top_locations(&self, code: &str, limit: i64) -> anyhow::Result<Vec<LocationCount>> {
            self.inner.top_locations(code, limit).await
        }
    }

    #[tokio::test]
    async fn test_stalled_lookup_is_storage_unavailable() {
        let registry = LinkRegistry::new(
            Arc::new(StalledStorage {
                inner: MemoryStorage::new(),
            }),
            RegistryConfig {
                storage_timeout_ms: 20,
                ..Default::default()
            },
        );
        let link = registry.create(new_link("https://example.com")).await.unwrap();

        let started = std::time::Instant::now();
        assert!(matches!(
            registry.resolve(&link.code).await,
            Err(RegistryError::StorageUnavailable(_))
        ));
        assert!(matches!(
            registry.get(&link.code).await,
            Err(RegistryError::StorageUnavailable(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_codes() {
        let registry = Arc::new(LinkRegistry::new(
            Arc::new(MemoryStorage::new()),
            RegistryConfig {
                // Small code space so collisions actually happen
                code_length: 3,
                max_attempts: 50,
                ..Default::default()
            },
        ));

        let mut handles = Vec::new();
        for i in 0..200 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry
                    .create(new_link(&format!("https://example.com/{i}")))
                    .await
            }));
        }

        let mut codes = HashSet::new();
        for handle in handles {
            let link = handle.await.unwrap().unwrap();
            assert!(codes.insert(link.code), "duplicate short code handed out");
        }
        assert_eq!(codes.len(), 200);
        assert_eq!(registry.list(None, 500, 0).await.unwrap().len(), 200);
    }
}
