use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub code: String,
    pub original_url: String,
    pub title: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub owner: Option<String>,
}

impl Link {
    /// A link stops redirecting once `now` reaches its expiry
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn tracking_url(&self, redirect_base_url: &str) -> String {
        format!(
            "{}/track/{}",
            redirect_base_url.trim_end_matches('/'),
            self.code
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub url: String,
    pub title: Option<String>,
    #[serde(alias = "expiry_days")]
    pub expiry_days: Option<u32>,
    pub owner: Option<String>,
}

/// A link as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct LinkResponse {
    #[serde(flatten)]
    pub link: Link,
    pub tracking_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clicks: Option<i64>,
}

impl LinkResponse {
    pub fn new(link: Link, redirect_base_url: &str) -> Self {
        let tracking_url = link.tracking_url(redirect_base_url);
        Self {
            link,
            tracking_url,
            clicks: None,
        }
    }

    pub fn with_clicks(mut self, clicks: i64) -> Self {
        self.clicks = Some(clicks);
        self
    }
}
