use thiserror::Error;

/// Failures of link creation, resolution and statistics reads
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The submitted destination is not an absolute http(s) URL
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("short code not found")]
    NotFound,
    /// The link exists but can no longer be redirected through
    #[error("link has expired")]
    Expired,
    /// Detail is for logs only, never for clients
    #[error("storage unavailable")]
    StorageUnavailable(#[source] anyhow::Error),
}

/// Failures of a single visit write
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("no link with short code {0}")]
    UnknownLink(String),
    #[error("visit storage failed")]
    Storage(#[source] anyhow::Error),
    #[error("visit storage timed out")]
    Timeout,
}
