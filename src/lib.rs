pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use std::sync::Arc;

use crate::app::counters::RepairStrategy;
use crate::config::AppConfig;
use crate::infra::store::EntityStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub reconcile_strategy: RepairStrategy,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, config: &AppConfig) -> Self {
        Self {
            store,
            admin_token: config.admin_token.clone(),
            paseto_access_key: config.paseto_access_key,
            access_ttl_minutes: config.access_ttl_minutes,
            reconcile_strategy: config.reconcile_strategy,
        }
    }
}
