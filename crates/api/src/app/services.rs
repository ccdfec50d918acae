//! Backend wiring: picks Postgres or in-memory storage from config.

use std::sync::Arc;

use sitestock_infra::store::postgres;
use sitestock_infra::{
    AuditLog, InMemoryAuditLog, InMemoryStore, LedgerConfig, LedgerService, PgAuditLog, PgStore,
    Store, StoreError,
};

/// The service as shared by every handler.
pub type AppServices = LedgerService<Arc<dyn Store>, Arc<dyn AuditLog>>;

/// Postgres when `database_url` is set (schema applied on startup), in-memory otherwise.
pub async fn build_services(config: &LedgerConfig) -> Result<AppServices, StoreError> {
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = postgres::connect(url, config.db_max_connections).await?;
            postgres::migrate(&pool).await?;
            tracing::info!(max_connections = config.db_max_connections, "using postgres backend");
            Ok(LedgerService::new(
                Arc::new(PgStore::new(pool.clone())) as Arc<dyn Store>,
                Arc::new(PgAuditLog::new(pool)) as Arc<dyn AuditLog>,
                config,
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory backend (data is lost on restart)");
            Ok(in_memory_services(config))
        }
    }
}

pub fn in_memory_services(config: &LedgerConfig) -> AppServices {
    LedgerService::new(
        Arc::new(InMemoryStore::new()) as Arc<dyn Store>,
        Arc::new(InMemoryAuditLog::new()) as Arc<dyn AuditLog>,
        config,
    )
}
