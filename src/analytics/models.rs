//! Data models for visit analytics

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::models::{LocationCount, Visit};

/// Geographic location information derived from an IP address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// ISO country code (e.g., "US", "GB")
    pub country_code: Option<String>,

    /// Country name
    pub country_name: Option<String>,

    /// City name
    pub city: Option<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoLocation {
    pub fn is_empty(&self) -> bool {
        self.country_code.is_none()
            && self.country_name.is_none()
            && self.city.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }

    /// Country as shown to users: the name when known, otherwise the ISO code
    pub fn country(&self) -> Option<String> {
        self.country_name.clone().or_else(|| self.country_code.clone())
    }
}

/// Precise location the visitor agreed to share (e.g. via the browser permission prompt)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl ConsentLocation {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// What the redirect request tells us about the visitor
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub consent: Option<ConsentLocation>,
}

impl RequestMetadata {
    pub fn from_ip(ip: IpAddr) -> Self {
        Self {
            client_ip: Some(ip),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_links: i64,
    pub total_visits: i64,
    /// Distinct (city, country) pairs among visits with a known city
    pub unique_locations: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStats {
    pub code: String,
    pub visit_count: i64,
    pub recent_visits: Vec<Visit>,
    pub top_locations: Vec<LocationCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_location_bounds() {
        let mut consent = ConsentLocation {
            latitude: 59.91,
            longitude: 10.75,
            city: None,
            country: None,
        };
        assert!(consent.is_valid());

        consent.latitude = 91.0;
        assert!(!consent.is_valid());

        consent.latitude = f64::NAN;
        assert!(!consent.is_valid());
    }

    #[test]
    fn test_country_prefers_name() {
        let geo = GeoLocation {
            country_code: Some("NO".to_string()),
            ..Default::default()
        };
        assert_eq!(geo.country().as_deref(), Some("NO"));

        let geo = GeoLocation {
            country_name: Some("Norway".to_string()),
            ..geo
        };
        assert_eq!(geo.country().as_deref(), Some("Norway"));
    }
}
