use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::error::RegistryError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// HTTP face of [`RegistryError`]
#[derive(Debug)]
pub struct ApiError(pub RegistryError);

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            RegistryError::InvalidUrl(message) => (StatusCode::BAD_REQUEST, message),
            RegistryError::NotFound => (StatusCode::NOT_FOUND, "Link not found".to_string()),
            RegistryError::Expired => (StatusCode::GONE, "Link has expired".to_string()),
            RegistryError::StorageUnavailable(err) => {
                error!(error = ?err, "storage unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
