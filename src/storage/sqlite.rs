use crate::models::{Link, LocationCount, Visit};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

const VISIT_COLUMNS: &str = "id, code, visited_at, latitude, longitude, city, country, ip_address, user_agent, location_source";

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                title TEXT,
                created_at INTEGER NOT NULL,
                expires_at INTEGER,
                owner TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL REFERENCES links(code),
                visited_at INTEGER NOT NULL,
                latitude REAL,
                longitude REAL,
                city TEXT,
                country TEXT,
                ip_address TEXT,
                user_agent TEXT,
                location_source TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_visits_code ON visits(code, visited_at)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn insert_link(&self, link: &Link) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO links (code, original_url, title, created_at, expires_at, owner)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(code) DO NOTHING
            "#,
        )
        .bind(&link.code)
        .bind(&link.original_url)
        .bind(&link.title)
        .bind(link.created_at)
        .bind(link.expires_at)
        .bind(&link.owner)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Ok(())
    }

    async fn get_link(&self, code: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT code, original_url, title, created_at, expires_at, owner
            FROM links
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_links(&self, owner: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Link>> {
        let links = match owner {
            Some(owner) => {
                sqlx::query_as::<_, Link>(
                    r#"
                    SELECT code, original_url, title, created_at, expires_at, owner
                    FROM links
                    WHERE owner = ?
                    ORDER BY created_at DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(owner)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, Link>(
                    r#"
                    SELECT code, original_url, title, created_at, expires_at, owner
                    FROM links
                    ORDER BY created_at DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool.as_ref())
                .await?
            }
        };

        Ok(links)
    }

    async fn count_links(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM links")
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(count)
    }

    async fn insert_visit(&self, visit: &Visit) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO visits (id, code, visited_at, latitude, longitude, city, country, ip_address, user_agent, location_source)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&visit.id)
        .bind(&visit.code)
        .bind(visit.visited_at)
        .bind(visit.latitude)
        .bind(visit.longitude)
        .bind(&visit.city)
        .bind(&visit.country)
        .bind(&visit.ip_address)
        .bind(&visit.user_agent)
        .bind(visit.location_source.as_str())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Ok(())
    }

    async fn count_visits(&self, code: Option<&str>) -> Result<i64> {
        let count = match code {
            Some(code) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM visits WHERE code = ?")
                    .bind(code)
                    .fetch_one(self.pool.as_ref())
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM visits")
                    .fetch_one(self.pool.as_ref())
                    .await?
            }
        };
        Ok(count)
    }

    async fn visit_counts(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        if codes.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT code, COUNT(*) FROM visits WHERE code IN (");
        let mut separated = builder.separated(", ");
        for code in codes {
            separated.push_bind(code.as_str());
        }
        separated.push_unseparated(") GROUP BY code");

        let rows: Vec<(String, i64)> = builder
            .build_query_as()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows.into_iter().collect())
    }

    async fn recent_visits(&self, code: Option<&str>, limit: i64) -> Result<Vec<Visit>> {
        let visits = match code {
            Some(code) => {
                sqlx::query_as::<_, Visit>(&format!(
                    "SELECT {VISIT_COLUMNS} FROM visits WHERE code = ? ORDER BY visited_at DESC, rowid DESC LIMIT ?"
                ))
                .bind(code)
                .bind(limit)
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, Visit>(&format!(
                    "SELECT {VISIT_COLUMNS} FROM visits ORDER BY visited_at DESC, rowid DESC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(self.pool.as_ref())
                .await?
            }
        };
        Ok(visits)
    }

    async fn count_unique_locations(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM (
                SELECT DISTINCT city, country
                FROM visits
                WHERE city IS NOT NULL AND city <> ''
            ) AS locations
            "#,
        )
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(count)
    }

    async fn top_locations(&self, code: &str, limit: i64) -> Result<Vec<LocationCount>> {
        let locations = sqlx::query_as::<_, LocationCount>(
            r#"
            SELECT city, country, COUNT(*) AS visits
            FROM visits
            WHERE code = ? AND city IS NOT NULL AND city <> ''
            GROUP BY city, country
            ORDER BY visits DESC, city ASC
            LIMIT ?
            "#,
        )
        .bind(code)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(locations)
    }
}
