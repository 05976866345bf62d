use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{
        header::{self, HeaderMap, HeaderValue},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use super::middleware::RequestStart;
use super::resolver::{RedirectOutcome, RedirectResolver};
use crate::analytics::{extract_client_ip, ConsentLocation, RequestMetadata};
use crate::config::{GeoConfig, RedirectMode};

pub struct RedirectState {
    pub resolver: RedirectResolver,
    pub geo: GeoConfig,
    pub redirect_status: RedirectMode,
}

/// Consent coordinates passed along on the tracking URL
#[derive(Debug, Default, Deserialize)]
pub struct TrackQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl TrackQuery {
    fn consent(&self) -> Option<ConsentLocation> {
        Some(ConsentLocation {
            latitude: self.lat?,
            longitude: self.lon?,
            city: None,
            country: None,
        })
    }
}

#[derive(Serialize)]
pub struct DestinationResponse {
    pub url: String,
}

fn request_metadata(
    state: &RedirectState,
    headers: &HeaderMap,
    addr: SocketAddr,
    consent: Option<ConsentLocation>,
) -> RequestMetadata {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    RequestMetadata {
        client_ip: Some(extract_client_ip(headers, addr.ip(), &state.geo)),
        user_agent,
        consent,
    }
}

/// Response for outcomes that do not lead to a destination
fn refusal(code: &str, outcome: Result<RedirectOutcome, crate::error::RegistryError>) -> Response {
    match outcome {
        Ok(RedirectOutcome::NotFound) => (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Ok(RedirectOutcome::Expired) => (StatusCode::GONE, "This link has expired").into_response(),
        Ok(RedirectOutcome::Redirect(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
        Err(err) => {
            error!(short_code = %code, error = ?err, "link lookup failed, refusing to redirect");
            (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable").into_response()
        }
    }
}

/// Header value for a destination. Non-ASCII destinations are sent in their
/// punycode / percent-encoded form.
fn location_value(url: &str) -> Option<HeaderValue> {
    if url.is_ascii() {
        return HeaderValue::from_str(url).ok();
    }
    let ascii = url::Url::parse(url).ok()?.to_string();
    HeaderValue::from_str(&ascii).ok()
}

/// Redirect a visitor to the link destination, recording the visit
pub async fn track_redirect(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    Query(query): Query<TrackQuery>,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let handler_start = Instant::now();
    let metadata = request_metadata(&state, &headers, addr, query.consent());

    let url = match state.resolver.resolve(&code, metadata).await {
        Ok(RedirectOutcome::Redirect(url)) => url,
        other => return refusal(&code, other),
    };

    let Some(location) = location_value(&url) else {
        warn!(short_code = %code, "destination cannot be sent as a Location header");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::LOCATION, location);
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response_headers.insert(
        "x-tracelink-timing-total-ms",
        HeaderValue::from(request_start.elapsed().as_millis() as u64),
    );
    response_headers.insert(
        "x-tracelink-timing-handler-ms",
        HeaderValue::from(handler_start.elapsed().as_millis() as u64),
    );

    debug!(short_code = %code, status = %state.redirect_status.status_code(), "redirecting");
    (state.redirect_status.status_code(), response_headers).into_response()
}

/// Script-driven variant: the visitor shares consent coordinates and gets
/// the destination back as JSON
pub async fn track_with_consent(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(consent): Json<ConsentLocation>,
) -> Response {
    let metadata = request_metadata(&state, &headers, addr, Some(consent));

    match state.resolver.resolve(&code, metadata).await {
        Ok(RedirectOutcome::Redirect(url)) => (
            [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
            Json(DestinationResponse { url }),
        )
            .into_response(),
        other => refusal(&code, other),
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
