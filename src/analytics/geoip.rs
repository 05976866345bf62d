//! Geolocation collaborators
//!
//! The recorder only sees the [`GeoLocator`] trait. Production uses
//! [`GeoIpService`], backed by a memory-mapped MaxMind City database;
//! [`NoopLocator`] is used when no database is configured.

use anyhow::{Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

use crate::analytics::models::GeoLocation;

/// Resolves a network address to a best-effort location
#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// An address with no known location yields an empty `GeoLocation`, not an error
    async fn locate(&self, ip: IpAddr) -> Result<GeoLocation>;
}

/// Locator that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLocator;

#[async_trait]
impl GeoLocator for NoopLocator {
    async fn locate(&self, _ip: IpAddr) -> Result<GeoLocation> {
        Ok(GeoLocation::default())
    }
}

/// GeoIP lookup service backed by a MaxMind GeoLite2-City/GeoIP2-City database
#[derive(Clone)]
pub struct GeoIpService {
    city_reader: Arc<Reader<Mmap>>,
}

impl GeoIpService {
    /// Memory-map the City database at `city_path`
    pub fn new(city_path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(city_path) }
            .with_context(|| format!("Failed to open GeoIP City database at {}", city_path))?;

        Ok(Self {
            city_reader: Arc::new(reader),
        })
    }

    /// Lookup geographic location for an IP address
    ///
    /// Returns an empty location when the address is not in the database.
    pub fn lookup(&self, ip: IpAddr) -> Result<GeoLocation> {
        let mut geo_location = GeoLocation::default();

        let result = self
            .city_reader
            .lookup(ip)
            .with_context(|| format!("GeoIP lookup failed for {ip}"))?;

        if let Ok(Some(city)) = result.decode::<geoip2::City>() {
            extract_from_city(&city, &mut geo_location);
        } else if let Ok(Some(country)) = result.decode::<geoip2::Country>() {
            // The City database is a superset of Country data, so this only
            // matters for records without city detail
            extract_from_country(&country, &mut geo_location);
        }

        Ok(geo_location)
    }
}

#[async_trait]
impl GeoLocator for GeoIpService {
    async fn locate(&self, ip: IpAddr) -> Result<GeoLocation> {
        self.lookup(ip)
    }
}

fn extract_from_city(city: &geoip2::City, geo_location: &mut GeoLocation) {
    geo_location.country_code = city.country.iso_code.map(|s| s.to_string());
    geo_location.country_name = city.country.names.english.map(|s| s.to_string());
    geo_location.city = city.city.names.english.map(|s| s.to_string());
    geo_location.latitude = city.location.latitude;
    geo_location.longitude = city.location.longitude;
}

fn extract_from_country(country: &geoip2::Country, geo_location: &mut GeoLocation) {
    geo_location.country_code = country.country.iso_code.map(|s| s.to_string());
    geo_location.country_name = country.country.names.english.map(|s| s.to_string());
}
