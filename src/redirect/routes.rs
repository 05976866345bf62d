use axum::{
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;

use super::handlers::{health_check, track_redirect, track_with_consent, RedirectState};
use super::middleware::record_request_start;

/// Public tracking router. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so handlers see the peer address.
pub fn create_redirect_router(state: RedirectState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/track/{code}", get(track_redirect).post(track_with_consent))
        .layer(middleware::from_fn(record_request_start))
        .with_state(Arc::new(state))
}
