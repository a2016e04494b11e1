use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};

use casavoz_config::Settings;
use casavoz_services::{PropertySearch, RoleClassifier};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub classifier: Arc<RoleClassifier>,
    pub listings: Arc<PropertySearch>,
    /// Live WebSocket connection count, for /health.
    pub connections: Arc<AtomicUsize>,
    /// Monotonic client id counter.
    pub client_seq: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let classifier = Arc::new(RoleClassifier::new(
            settings.openai.api_key.clone(),
            settings.openai.model.clone(),
            settings.roles.max_tokens,
        ));
        let listings = Arc::new(PropertySearch::load(
            &settings.openai,
            &settings.properties.catalog_path,
        )?);

        Ok(Self {
            settings,
            classifier,
            listings,
            connections: Arc::new(AtomicUsize::new(0)),
            client_seq: Arc::new(AtomicU64::new(0)),
        })
    }
}
