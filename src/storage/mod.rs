pub mod cached;
pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use cached::CachedStorage;
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

use crate::config::{CacheConfig, DatabaseBackend, DatabaseConfig};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Open and initialize the configured backend, wrapped in the link cache when enabled
pub async fn connect(database: &DatabaseConfig, cache: &CacheConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match database.backend {
        DatabaseBackend::Memory => {
            info!("Using in-memory storage (data is lost on shutdown)");
            Arc::new(MemoryStorage::new())
        }
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", database.url);
            Arc::new(
                SqliteStorage::new(&database.url, database.max_connections)
                    .await
                    .context("Failed to connect to SQLite")?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&database.url, database.max_connections)
                    .await
                    .context("Failed to connect to PostgreSQL")?,
            )
        }
    };

    storage
        .init()
        .await
        .context("Failed to initialize database schema")?;

    if cache.max_entries == 0 {
        return Ok(storage);
    }

    info!(
        "Caching up to {} link lookups for {}s",
        cache.max_entries, cache.ttl_secs
    );
    Ok(Arc::new(CachedStorage::new(
        storage,
        cache.max_entries,
        cache.ttl_secs,
    )))
}
