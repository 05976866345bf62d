//! Statistics API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use super::handlers::AppState;
use crate::analytics::{GlobalStats, LinkStats};
use crate::models::Visit;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    /// Clamped to 1..=100; defaults to the configured recent-visit limit
    pub limit: Option<i64>,
}

/// Visit count, recent visits and top locations for one link
pub async fn link_stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<LinkStats>, ApiError> {
    Ok(Json(state.aggregator.link_stats(&code).await?))
}

pub async fn global_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GlobalStats>, ApiError> {
    Ok(Json(state.aggregator.global_stats().await?))
}

/// Latest visits across all links
pub async fn recent_activity(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<Visit>>, ApiError> {
    Ok(Json(state.aggregator.recent_activity(query.limit).await?))
}
