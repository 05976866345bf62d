use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::analytics::Aggregator;
use crate::auth::Caller;
use crate::models::{CreateLinkRequest, LinkResponse};
use crate::registry::{LinkRegistry, NewLink};

pub struct AppState {
    pub registry: Arc<LinkRegistry>,
    pub aggregator: Arc<Aggregator>,
    /// Public origin of the redirect server
    pub redirect_base_url: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub owner: Option<String>,
}

fn default_limit() -> i64 {
    50
}

/// The authenticated owner, if any, takes the place of a client-supplied one
fn effective_owner(caller: &Caller, requested: Option<String>) -> Option<String> {
    caller
        .owner
        .clone()
        .or_else(|| requested.filter(|owner| !owner.trim().is_empty()))
}

/// Create a new tracked link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), ApiError> {
    let owner = effective_owner(&caller, payload.owner);

    let link = state
        .registry
        .create(NewLink {
            original_url: payload.url,
            title: payload.title,
            expiry_days: payload.expiry_days,
            owner,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LinkResponse::new(link, &state.redirect_base_url)),
    ))
}

/// Link detail, including expired links
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<LinkResponse>, ApiError> {
    let link = state.registry.get(&code).await?;
    Ok(Json(LinkResponse::new(link, &state.redirect_base_url)))
}

/// Links newest first, with click counts
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<LinkResponse>>, ApiError> {
    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);
    let owner = effective_owner(&caller, query.owner);

    let links = state
        .aggregator
        .list_with_clicks(owner.as_deref(), limit, offset, &state.redirect_base_url)
        .await?;

    Ok(Json(links))
}

pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
