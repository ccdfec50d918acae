//! Item, ledger and catalog persistence.
//!
//! - `r#trait`: store contracts and `StoreError`
//! - `in_memory`: lock-based backend for tests and local runs
//! - `postgres`: `sqlx` backend

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PgStore;
pub use r#trait::{CatalogStore, InventoryStore, Store, StoreError};
