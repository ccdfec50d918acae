//! Infrastructure layer: stores, the transaction processor, audit recording
//! and configuration.
//!
//! [`LedgerService`] is the entry point; everything else is exposed for
//! wiring and tests.

pub mod audit_log;
pub mod config;
pub mod error;
pub mod item_locks;
pub mod processor;
pub mod recorder;
pub mod service;
pub mod store;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
pub(crate) mod test_support;

pub use audit_log::{AuditLog, InMemoryAuditLog, PgAuditLog};
pub use config::{ConfigError, LedgerConfig};
pub use error::{LedgerResult, LedgerServiceError};
pub use item_locks::ItemLocks;
pub use processor::{MovementRequest, TransactionProcessor};
pub use recorder::AuditRecorder;
pub use service::{LedgerService, OPENING_BALANCE_NOTE};
pub use store::{CatalogStore, InMemoryStore, InventoryStore, PgStore, Store, StoreError};
