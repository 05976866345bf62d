use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::{self, Next},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::{auth_middleware, AuthService};

use super::handlers::{create_link, get_link, health_check, list_links, AppState};
use super::stats::{global_stats, link_stats, recent_activity};

pub fn create_api_router(state: AppState, auth_service: Arc<AuthService>) -> Router {
    let state = Arc::new(state);

    let protected_routes = Router::new()
        .route("/links", post(create_link).get(list_links))
        .route("/links/{code}", get(get_link))
        .route("/links/{code}/stats", get(link_stats))
        .route("/stats", get(global_stats))
        .route("/activity", get(recent_activity))
        .route_layer(middleware::from_fn(move |headers: HeaderMap, req: Request, next: Next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
}
