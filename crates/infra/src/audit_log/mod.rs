//! Audit record persistence.
//!
//! The log is append-only. Writes go through [`crate::AuditRecorder`], which
//! swallows failures; reads are admin-only and enforced one layer up.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use sitestock_audit::{AuditError, AuditFilter, AuditRecord};
use sitestock_core::{Page, PageWindow};

use crate::store::StoreError;

pub use in_memory::InMemoryAuditLog;
pub use postgres::PgAuditLog;

#[async_trait::async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;

    /// Records matching `filter`, most recent first.
    async fn query(
        &self,
        filter: &AuditFilter,
        window: PageWindow,
    ) -> Result<Page<AuditRecord>, StoreError>;
}

#[async_trait::async_trait]
impl<L> AuditLog for Arc<L>
where
    L: AuditLog + ?Sized,
{
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        (**self).append(record).await
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        window: PageWindow,
    ) -> Result<Page<AuditRecord>, StoreError> {
        (**self).query(filter, window).await
    }
}
