//! Store and audit-log doubles for failure-path tests.

use std::sync::atomic::{AtomicU32, Ordering};

use sitestock_audit::{AuditError, AuditFilter, AuditRecord};
use sitestock_core::{
    CategoryId, ExpectedVersion, ItemId, LocationId, Page, PageWindow, ProjectId,
};
use sitestock_inventory::{
    Category, Item, ItemDetails, ItemFilter, LedgerEntry, LedgerFilter, Location, Project,
    ProjectTotals,
};

use crate::audit_log::AuditLog;
use crate::store::{CatalogStore, InventoryStore, StoreError};

/// Audit log whose writes always fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingAuditLog;

#[async_trait::async_trait]
impl AuditLog for FailingAuditLog {
    async fn append(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Err(AuditError::WriteFailed("audit sink unavailable".to_string()))
    }

    async fn query(
        &self,
        _filter: &AuditFilter,
        window: PageWindow,
    ) -> Result<Page<AuditRecord>, StoreError> {
        Ok(Page::new(Vec::new(), 0, window))
    }
}

/// Wraps a store and loses every compare-and-swap.
///
/// That includes creating an item together with its opening entry; plain
/// inserts without stock go through.
#[derive(Debug)]
pub struct ConflictingStore<S> {
    inner: S,
    attempts: AtomicU32,
}

impl<S> ConflictingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            attempts: AtomicU32::new(0),
        }
    }

    pub fn commit_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<S: InventoryStore> InventoryStore for ConflictingStore<S> {
    async fn insert_item(
        &self,
        item: &Item,
        opening: Option<&LedgerEntry>,
    ) -> Result<Item, StoreError> {
        if opening.is_some() {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::VersionConflict(
                "simulated concurrent writer on opening entry".to_string(),
            ));
        }
        self.inner.insert_item(item, None).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.inner.get_item(id).await
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        self.inner.list_items(filter).await
    }

    async fn update_details(&self, id: ItemId, details: &ItemDetails) -> Result<Item, StoreError> {
        self.inner.update_details(id, details).await
    }

    async fn set_reorder_level(&self, id: ItemId, level: i64) -> Result<Item, StoreError> {
        self.inner.set_reorder_level(id, level).await
    }

    async fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        self.inner.delete_item(id).await
    }

    async fn commit_movement(
        &self,
        _entry: &LedgerEntry,
        expected: ExpectedVersion,
    ) -> Result<Item, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::VersionConflict(format!(
            "simulated concurrent writer (expected {expected:?})"
        )))
    }

    async fn ledger_entries(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.ledger_entries(item_id).await
    }

    async fn query_ledger(
        &self,
        filter: &LedgerFilter,
        window: PageWindow,
    ) -> Result<Page<LedgerEntry>, StoreError> {
        self.inner.query_ledger(filter, window).await
    }

    async fn project_totals(&self) -> Result<Vec<ProjectTotals>, StoreError> {
        self.inner.project_totals().await
    }
}

#[async_trait::async_trait]
impl<S: CatalogStore> CatalogStore for ConflictingStore<S> {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        self.inner.insert_category(category).await
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        self.inner.get_category(id).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        self.inner.list_categories().await
    }

    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        self.inner.update_category(category).await
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError> {
        self.inner.delete_category(id).await
    }

    async fn insert_location(&self, location: &Location) -> Result<(), StoreError> {
        self.inner.insert_location(location).await
    }

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        self.inner.get_location(id).await
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        self.inner.list_locations().await
    }

    async fn update_location(&self, location: &Location) -> Result<(), StoreError> {
        self.inner.update_location(location).await
    }

    async fn delete_location(&self, id: LocationId) -> Result<(), StoreError> {
        self.inner.delete_location(id).await
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        self.inner.insert_project(project).await
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        self.inner.get_project(id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.inner.list_projects().await
    }

    async fn update_project(&self, project: &Project) -> Result<(), StoreError> {
        self.inner.update_project(project).await
    }

    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        self.inner.delete_project(id).await
    }
}
