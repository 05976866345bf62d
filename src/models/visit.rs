use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// Where a visit's location fields came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// Coordinates granted by the visitor
    Consent,
    /// Looked up from the network address
    Network,
    None,
}

impl LocationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationSource::Consent => "consent",
            LocationSource::Network => "network",
            LocationSource::None => "none",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown location source: {0}")]
pub struct UnknownLocationSource(String);

impl TryFrom<String> for LocationSource {
    type Error = UnknownLocationSource;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "consent" => Ok(LocationSource::Consent),
            "network" => Ok(LocationSource::Network),
            "none" => Ok(LocationSource::None),
            _ => Err(UnknownLocationSource(value)),
        }
    }
}

/// One recorded resolution of a link. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Visit {
    pub id: String,
    pub code: String,
    pub visited_at: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[sqlx(try_from = "String")]
    pub location_source: LocationSource,
}

/// Visit count for one (city, country) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LocationCount {
    pub city: String,
    pub country: Option<String>,
    pub visits: i64,
}
