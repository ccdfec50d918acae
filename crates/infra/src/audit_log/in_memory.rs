use std::sync::RwLock;

use sitestock_audit::{newest_first, AuditError, AuditFilter, AuditRecord};
use sitestock_core::{Page, PageWindow};

use super::AuditLog;
use crate::store::StoreError;

#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything appended so far, in append order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| AuditError::WriteFailed("audit log lock poisoned".to_string()))?;
        records.push(record.clone());
        Ok(())
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        window: PageWindow,
    ) -> Result<Page<AuditRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("audit log lock poisoned".to_string()))?;
        let mut matched: Vec<AuditRecord> =
            records.iter().filter(|r| filter.matches(r)).cloned().collect();
        matched.sort_by(newest_first);
        Ok(Page::new(window.apply(&matched), matched.len() as u64, window))
    }
}
