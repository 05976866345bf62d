use crate::models::{Link, LocationCount, Visit};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::sync::Arc;

const VISIT_COLUMNS: &str = "id, code, visited_at, latitude, longitude, city, country, ip_address, user_agent, location_source";

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGSERIAL PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                title TEXT,
                created_at BIGINT NOT NULL,
                expires_at BIGINT,
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
                seq BIGSERIAL NOT NULL,
                code TEXT NOT NULL REFERENCES links(code),
                visited_at BIGINT NOT NULL,
                latitude DOUBLE PRECISION,
                longitude DOUBLE PRECISION,
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
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (code) DO NOTHING
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
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_links(&self, owner: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT code, original_url, title, created_at, expires_at, owner
            FROM links
            WHERE $1::TEXT IS NULL OR owner = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn count_links(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM links")
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(count.0)
    }

    async fn insert_visit(&self, visit: &Visit) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO visits (id, code, visited_at, latitude, longitude, city, country, ip_address, user_agent, location_source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
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
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM visits WHERE $1::TEXT IS NULL OR code = $1")
                .bind(code)
                .fetch_one(self.pool.as_ref())
                .await?;
        Ok(count.0)
    }

    async fn visit_counts(&self, codes: &[String]) -> Result<HashMap<String, i64>> {
        if codes.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT code, COUNT(*) FROM visits WHERE code IN (");
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
        let query = format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE $1::TEXT IS NULL OR code = $1 ORDER BY visited_at DESC, seq DESC LIMIT $2"
        );
        let visits = sqlx::query_as::<_, Visit>(&query)
            .bind(code)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;
        Ok(visits)
    }

    async fn count_unique_locations(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
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
        Ok(count.0)
    }

    async fn top_locations(&self, code: &str, limit: i64) -> Result<Vec<LocationCount>> {
        let locations = sqlx::query_as::<_, LocationCount>(
            r#"
            SELECT city, country, COUNT(*) AS visits
            FROM visits
            WHERE code = $1 AND city IS NOT NULL AND city <> ''
            GROUP BY city, country
            ORDER BY visits DESC, city ASC
            LIMIT $2
            "#,
        )
        .bind(code)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(locations)
    }
}
