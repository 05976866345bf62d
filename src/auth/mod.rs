use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::{AuthConfig, AuthMode};

/// Who is calling the API. `owner` is set only for an authenticated key.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub owner: Option<String>,
}

pub struct AuthService {
    mode: AuthMode,
    /// API key to owner
    keys: Arc<HashMap<String, String>>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        let keys = config
            .api_keys
            .iter()
            .map(|(owner, key)| (key.clone(), owner.clone()))
            .collect();

        Self {
            mode: config.mode,
            keys: Arc::new(keys),
        }
    }

    pub fn disabled() -> Self {
        Self {
            mode: AuthMode::None,
            keys: Arc::new(HashMap::new()),
        }
    }

    /// Resolve the caller for a presented key, `None` when the key is rejected
    pub fn authenticate(&self, key: Option<&str>) -> Option<Caller> {
        match self.mode {
            AuthMode::None => Some(Caller::default()),
            AuthMode::ApiKey => {
                let owner = self.keys.get(key?)?;
                Some(Caller {
                    owner: Some(owner.clone()),
                })
            }
        }
    }
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let api_key = headers.get("X-API-Key").and_then(|h| h.to_str().ok());

    match auth_service.authenticate(api_key) {
        Some(caller) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        None => {
            debug!(path = %request.uri().path(), "rejected API key");
            (StatusCode::UNAUTHORIZED, "Invalid or missing API key").into_response()
        }
    }
}
