//! Wiring of the components behind both routers

use axum::Router;
use std::sync::Arc;

use crate::analytics::{Aggregator, GeoLocator, VisitDispatcher, VisitRecorder};
use crate::api::{create_api_router, AppState};
use crate::auth::AuthService;
use crate::config::Config;
use crate::redirect::{create_redirect_router, RedirectResolver, RedirectState};
use crate::registry::LinkRegistry;
use crate::storage::Storage;

pub struct App {
    pub api_router: Router,
    pub redirect_router: Router,
    /// Handle for draining in-flight visit recordings
    pub dispatcher: VisitDispatcher,
}

impl App {
    pub fn new(config: &Config, storage: Arc<dyn Storage>, locator: Arc<dyn GeoLocator>) -> Self {
        let registry = Arc::new(LinkRegistry::new(
            Arc::clone(&storage),
            config.registry.clone(),
        ));

        let recorder = Arc::new(VisitRecorder::new(
            Arc::clone(&storage),
            locator,
            config.recorder.clone(),
            config.geo.ip_anonymization,
        ));
        let dispatcher = VisitDispatcher::new(recorder);

        let aggregator = Arc::new(Aggregator::new(
            Arc::clone(&registry),
            storage,
            config.recorder.storage_timeout(),
            config.recorder.recent_visits_limit,
        ));

        let api_router = create_api_router(
            AppState {
                registry: Arc::clone(&registry),
                aggregator,
                redirect_base_url: config.redirect_base_url.clone(),
            },
            Arc::new(AuthService::new(&config.auth)),
        );

        let redirect_router = create_redirect_router(RedirectState {
            resolver: RedirectResolver::new(registry, dispatcher.clone()),
            geo: config.geo.clone(),
            redirect_status: config.redirect_status,
        });

        Self {
            api_router,
            redirect_router,
            dispatcher,
        }
    }
}
