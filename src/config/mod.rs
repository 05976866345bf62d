use anyhow::Context;
use axum::http::StatusCode;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    /// Public origin of the redirect server, used to build tracking URLs
    pub redirect_base_url: String,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub registry: RegistryConfig,
    pub recorder: RecorderConfig,
    pub geo: GeoConfig,
    pub redirect_status: RedirectMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Memory,
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    None,
    ApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// `(owner, key)` pairs accepted in `AuthMode::ApiKey`
    #[serde(default)]
    pub api_keys: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached link lookups; 0 disables the cache
    pub max_entries: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub code_length: usize,
    /// Attempts at finding a free short code before giving up
    pub max_attempts: u32,
    pub storage_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    pub geo_timeout_ms: u64,
    pub storage_timeout_ms: u64,
    /// Total write attempts per visit, including the first one
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Number of visits returned with per-link stats and the activity feed
    pub recent_visits_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Path to a MaxMind GeoLite2-City or GeoIP2-City database
    pub geoip_city_db_path: Option<String>,
    pub ip_anonymization: bool,
    pub trusted_proxy_mode: TrustedProxyMode,
    pub trusted_proxies: Vec<IpNet>,
    pub num_trusted_proxies: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Only trust the socket address
    None,
    /// Trust `Forwarded` and `X-Forwarded-For`
    Standard,
    /// Trust `CF-Connecting-IP`
    Cloudflare,
}

/// HTTP status used for tracking redirects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RedirectMode {
    MovedPermanently,
    #[default]
    Found,
    TemporaryRedirect,
    PermanentRedirect,
}

impl RedirectMode {
    pub fn status_code(self) -> StatusCode {
        match self {
            RedirectMode::MovedPermanently => StatusCode::MOVED_PERMANENTLY,
            RedirectMode::Found => StatusCode::FOUND,
            RedirectMode::TemporaryRedirect => StatusCode::TEMPORARY_REDIRECT,
            RedirectMode::PermanentRedirect => StatusCode::PERMANENT_REDIRECT,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "301" => Some(RedirectMode::MovedPermanently),
            "302" => Some(RedirectMode::Found),
            "307" => Some(RedirectMode::TemporaryRedirect),
            "308" => Some(RedirectMode::PermanentRedirect),
            _ => None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_secs: 300,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            code_length: 8,
            max_attempts: 5,
            storage_timeout_ms: 2_000,
        }
    }
}

impl RegistryConfig {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            geo_timeout_ms: 250,
            storage_timeout_ms: 2_000,
            max_attempts: 3,
            retry_backoff_ms: 100,
            recent_visits_limit: 10,
        }
    }
}

impl RecorderConfig {
    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.recent_visits_limit >= 1,
            "RECENT_VISITS_LIMIT must be at least 1"
        );
        Ok(())
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            geoip_city_db_path: None,
            ip_anonymization: false,
            trusted_proxy_mode: TrustedProxyMode::None,
            trusted_proxies: vec![],
            num_trusted_proxies: None,
        }
    }
}

/// In-memory, unauthenticated configuration on the default ports
impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                backend: DatabaseBackend::Memory,
                url: String::new(),
                max_connections: 1,
            },
            api_server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            redirect_server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            redirect_base_url: "http://127.0.0.1:3000".to_string(),
            auth: AuthConfig {
                mode: AuthMode::None,
                api_keys: vec![],
            },
            cache: CacheConfig::default(),
            registry: RegistryConfig::default(),
            recorder: RecorderConfig::default(),
            geo: GeoConfig::default(),
            redirect_status: RedirectMode::default(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {value}")),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Parses `owner:key` pairs separated by commas
fn parse_api_keys(raw: &str) -> anyhow::Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (owner, key) = entry
                .split_once(':')
                .with_context(|| format!("API_KEYS entry '{entry}' must look like owner:key"))?;
            anyhow::ensure!(
                !owner.is_empty() && !key.is_empty(),
                "API_KEYS entry '{entry}' has an empty owner or key"
            );
            Ok((owner.to_string(), key.to_string()))
        })
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: memory, sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = env_or("DATABASE_URL", "sqlite://./tracelink.db?mode=rwc");
        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = env_parse("API_PORT", 8080u16)?;
        let redirect_host = env_or("REDIRECT_HOST", "127.0.0.1");
        let redirect_port = env_parse("REDIRECT_PORT", 3000u16)?;

        let redirect_base_url = env_or(
            "REDIRECT_BASE_URL",
            &format!("http://{redirect_host}:{redirect_port}"),
        )
        .trim_end_matches('/')
        .to_string();

        let auth_mode = if env_flag("DISABLE_AUTH") {
            AuthMode::None
        } else {
            match env_or("AUTH_MODE", "none").to_lowercase().as_str() {
                "none" => AuthMode::None,
                "api_key" | "apikey" => AuthMode::ApiKey,
                other => {
                    tracing::warn!(
                        "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, api_key"
                    );
                    AuthMode::None
                }
            }
        };

        let api_keys = parse_api_keys(&env_or("API_KEYS", ""))?;
        if auth_mode == AuthMode::ApiKey && api_keys.is_empty() {
            anyhow::bail!("API_KEYS must be set when AUTH_MODE=api_key");
        }

        let cache = CacheConfig {
            max_entries: env_parse("CACHE_MAX_ENTRIES", CacheConfig::default().max_entries)?,
            ttl_secs: env_parse("CACHE_TTL_SECS", CacheConfig::default().ttl_secs)?,
        };

        let storage_timeout_ms = env_parse("STORAGE_TIMEOUT_MS", 2_000u64)?;

        let registry = RegistryConfig {
            code_length: env_parse("SHORT_CODE_LENGTH", RegistryConfig::default().code_length)?,
            max_attempts: env_parse(
                "SHORT_CODE_MAX_ATTEMPTS",
                RegistryConfig::default().max_attempts,
            )?,
            storage_timeout_ms,
        };
        anyhow::ensure!(
            (4..=32).contains(&registry.code_length),
            "SHORT_CODE_LENGTH must be between 4 and 32"
        );

        let defaults = RecorderConfig::default();
        let recorder = RecorderConfig {
            geo_timeout_ms: env_parse("GEO_TIMEOUT_MS", defaults.geo_timeout_ms)?,
            storage_timeout_ms,
            max_attempts: env_parse("RECORDER_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
            retry_backoff_ms: env_parse("RECORDER_RETRY_BACKOFF_MS", defaults.retry_backoff_ms)?,
            recent_visits_limit: env_parse(
                "RECENT_VISITS_LIMIT",
                defaults.recent_visits_limit,
            )?,
        };
        recorder.validate()?;

        let trusted_proxy_mode = match env_or("TRUSTED_PROXY_MODE", "none").to_lowercase().as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = env_or("TRUSTED_PROXIES", "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<IpNet>()
                    .or_else(|_| s.parse::<std::net::IpAddr>().map(IpNet::from))
                    .with_context(|| format!("TRUSTED_PROXIES entry '{s}' is not an IP or CIDR"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .map(|v| v.trim().parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?;

        let geo = GeoConfig {
            geoip_city_db_path: std::env::var("GEOIP_CITY_DB_PATH").ok(),
            ip_anonymization: env_flag("IP_ANONYMIZATION"),
            trusted_proxy_mode,
            trusted_proxies,
            num_trusted_proxies,
        };

        let redirect_status = match std::env::var("REDIRECT_STATUS") {
            Ok(value) => RedirectMode::parse(&value)
                .with_context(|| format!("REDIRECT_STATUS must be 301, 302, 307 or 308, got {value}"))?,
            Err(_) => RedirectMode::default(),
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            redirect_base_url,
            auth: AuthConfig {
                mode: auth_mode,
                api_keys,
            },
            cache,
            registry,
            recorder,
            geo,
            redirect_status,
        })
    }
}
