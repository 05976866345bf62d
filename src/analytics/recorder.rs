//! Visit recorder: turns request metadata into an appended visit

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analytics::geoip::GeoLocator;
use crate::analytics::ip_extractor::anonymize_ip;
use crate::analytics::models::{GeoLocation, RequestMetadata};
use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::models::{LocationSource, Visit};
use crate::storage::{Storage, StorageError};

pub struct VisitRecorder {
    storage: Arc<dyn Storage>,
    locator: Arc<dyn GeoLocator>,
    config: RecorderConfig,
    ip_anonymization: bool,
}

impl VisitRecorder {
    pub fn new(
        storage: Arc<dyn Storage>,
        locator: Arc<dyn GeoLocator>,
        config: RecorderConfig,
        ip_anonymization: bool,
    ) -> Self {
        Self {
            storage,
            locator,
            config,
            ip_anonymization,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Record one visit against an existing link
    pub async fn record(
        &self,
        code: &str,
        metadata: &RequestMetadata,
    ) -> Result<Visit, RecorderError> {
        let link = tokio::time::timeout(self.config.storage_timeout(), self.storage.get_link(code))
            .await
            .map_err(|_| RecorderError::Timeout)?
            .map_err(RecorderError::Storage)?;
        if link.is_none() {
            return Err(RecorderError::UnknownLink(code.to_string()));
        }

        let visit = self.build_visit(code, metadata).await;
        self.persist(&visit).await?;
        Ok(visit)
    }

    /// Assemble a visit with a fresh id, resolving its location
    ///
    /// Never fails: a slow or broken locator only leaves the location empty.
    pub(crate) async fn build_visit(&self, code: &str, metadata: &RequestMetadata) -> Visit {
        let client_ip = metadata.client_ip.map(|ip| {
            if self.ip_anonymization {
                anonymize_ip(ip)
            } else {
                ip
            }
        });

        let consent = metadata.consent.as_ref().filter(|consent| {
            let valid = consent.is_valid();
            if !valid {
                warn!(code, "ignoring out-of-range consent coordinates");
            }
            valid
        });

        // Consent wins field by field; the address lookup only fills blanks
        let network = match client_ip {
            Some(ip) if consent.is_none_or(|c| c.city.is_none() || c.country.is_none()) => {
                self.locate(ip).await
            }
            _ => GeoLocation::default(),
        };

        let (latitude, longitude, city, country, location_source) = match consent {
            Some(consent) => (
                Some(consent.latitude),
                Some(consent.longitude),
                consent.city.clone().or_else(|| network.city.clone()),
                consent.country.clone().or_else(|| network.country()),
                LocationSource::Consent,
            ),
            None if network.is_empty() => (None, None, None, None, LocationSource::None),
            None => (
                network.latitude,
                network.longitude,
                network.city.clone(),
                network.country(),
                LocationSource::Network,
            ),
        };

        Visit {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            visited_at: chrono::Utc::now().timestamp(),
            latitude,
            longitude,
            city,
            country,
            ip_address: client_ip.map(|ip| ip.to_string()),
            user_agent: metadata.user_agent.clone(),
            location_source,
        }
    }

    /// Best-effort address lookup bounded by the geolocation timeout
    async fn locate(&self, ip: std::net::IpAddr) -> GeoLocation {
        match tokio::time::timeout(self.config.geo_timeout(), self.locator.locate(ip)).await {
            Ok(Ok(location)) => location,
            Ok(Err(err)) => {
                warn!(%ip, error = %err, "geolocation lookup failed, recording without location");
                GeoLocation::default()
            }
            Err(_) => {
                warn!(
                    %ip,
                    timeout_ms = self.config.geo_timeout_ms,
                    "geolocation lookup timed out, recording without location"
                );
                GeoLocation::default()
            }
        }
    }

    /// Write a visit. Rewriting an id that is already stored counts as success,
    /// which keeps retries of a write that actually landed from duplicating it.
    pub(crate) async fn persist(&self, visit: &Visit) -> Result<(), RecorderError> {
        match tokio::time::timeout(self.config.storage_timeout(), self.storage.insert_visit(visit))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(StorageError::Conflict)) => {
                debug!(visit_id = %visit.id, "visit already stored");
                Ok(())
            }
            Ok(Err(StorageError::Other(err))) => Err(RecorderError::Storage(err)),
            Err(_) => Err(RecorderError::Timeout),
        }
    }
}
