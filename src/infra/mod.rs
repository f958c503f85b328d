pub mod db;
pub mod store;

use anyhow::Result;
use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};
use crate::infra::db::Db;
use crate::infra::store::{EntityStore, MemoryStore, PgStore};

/// Opens the configured backend, migrating the schema when it is PostgreSQL.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn EntityStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let db = Db::connect(config).await?;
            db.migrate().await?;
            tracing::info!("connected to postgres store");
            Ok(Arc::new(PgStore::new(db)))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
