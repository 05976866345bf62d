//! Redirect resolution: registry lookup, then visit dispatch, then destination

use std::sync::Arc;
use tracing::debug;

use crate::analytics::{RequestMetadata, VisitDispatcher};
use crate::error::RegistryError;
use crate::registry::LinkRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Redirect(String),
    NotFound,
    Expired,
}

#[derive(Clone)]
pub struct RedirectResolver {
    registry: Arc<LinkRegistry>,
    dispatcher: VisitDispatcher,
}

impl RedirectResolver {
    pub fn new(registry: Arc<LinkRegistry>, dispatcher: VisitDispatcher) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Resolve a short code for a visitor
    ///
    /// A visit is only dispatched once the link is known to exist and be
    /// live. Recording happens off this call path: its latency or failure
    /// never reaches the caller. `Err` means the registry could not be
    /// consulted, and the caller must not redirect.
    pub async fn resolve(
        &self,
        code: &str,
        metadata: RequestMetadata,
    ) -> Result<RedirectOutcome, RegistryError> {
        let link = match self.registry.resolve(code).await {
            Ok(link) => link,
            Err(RegistryError::NotFound) => return Ok(RedirectOutcome::NotFound),
            Err(RegistryError::Expired) => return Ok(RedirectOutcome::Expired),
            Err(err) => return Err(err),
        };

        self.dispatcher.dispatch(link.code, metadata);
        debug!(code, "resolved link, visit dispatched");

        Ok(RedirectOutcome::Redirect(link.original_url))
    }

    pub fn dispatcher(&self) -> &VisitDispatcher {
        &self.dispatcher
    }
}
