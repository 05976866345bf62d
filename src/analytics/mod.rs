//! Visit analytics
//!
//! Geolocation of visitors, the visit recorder and its off-request-path
//! dispatcher, and the statistics aggregator.

pub mod aggregator;
pub mod dispatcher;
pub mod geoip;
pub mod ip_extractor;
pub mod models;
pub mod recorder;

pub use aggregator::Aggregator;
pub use dispatcher::VisitDispatcher;
pub use geoip::{GeoIpService, GeoLocator, NoopLocator};
pub use ip_extractor::extract_client_ip;
pub use models::{ConsentLocation, GeoLocation, GlobalStats, LinkStats, RequestMetadata};
pub use recorder::VisitRecorder;
