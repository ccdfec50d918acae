use std::sync::Arc;

use thiserror::Error;

use sitestock_core::{
    CategoryId, ExpectedVersion, ItemId, LocationId, Page, PageWindow, ProjectId,
};
use sitestock_inventory::{
    Category, Item, ItemDetails, ItemFilter, LedgerEntry, LedgerFilter, Location, Project,
    ProjectTotals,
};

/// Storage operation error.
///
/// Infrastructure-level failures, as opposed to domain rule violations.
///
/// - **VersionConflict**: the item moved on since it was read (compare-and-swap lost)
/// - **NotFound**: addressed row does not exist
/// - **Conflict**: the write would break referential rules (duplicate id, deleting referenced rows)
/// - **Backend**: anything else the backend reports
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict: {0}")]
    VersionConflict(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Validate the opening entry handed to `insert_item` against the new item.
pub(crate) fn check_opening(item: &Item, entry: &LedgerEntry) -> Result<(), StoreError> {
    if entry.item_id != item.id_typed() {
        return Err(StoreError::Conflict(format!(
            "opening entry {} belongs to item {}, not {}",
            entry.id,
            entry.item_id,
            item.id_typed()
        )));
    }
    if entry.sequence != 1 || entry.previous_quantity() != 0 {
        return Err(StoreError::VersionConflict(format!(
            "opening entry {} must be the first movement (sequence {})",
            entry.id, entry.sequence
        )));
    }
    Ok(())
}

/// Item state and the per-item ledger.
///
/// ## Atomicity
///
/// `commit_movement` is the only way on-hand quantity changes. Implementations
/// must write the new quantity/version and append the ledger entry as one
/// unit: both become visible together or neither does.
///
/// ## Concurrency
///
/// `commit_movement` checks `expected` against the stored item version and
/// fails with `StoreError::VersionConflict` on mismatch. Callers re-read and
/// retry. Readers never observe a quantity without its ledger entry.
///
/// There is no quantity setter here.
#[async_trait::async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert a freshly created item (version 0, zero stock).
    ///
    /// With `opening`, the item's first ledger entry is committed in the same
    /// unit: either the item exists with that entry applied, or nothing was
    /// written. Returns the item as stored.
    async fn insert_item(&self, item: &Item, opening: Option<&LedgerEntry>)
    -> Result<Item, StoreError>;

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Items matching `filter`, ordered by name.
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError>;

    /// Overwrite descriptive fields. Quantity and version are untouched.
    async fn update_details(&self, id: ItemId, details: &ItemDetails) -> Result<Item, StoreError>;

    async fn set_reorder_level(&self, id: ItemId, level: i64) -> Result<Item, StoreError>;

    /// Delete an item that has no ledger history (`Conflict` otherwise).
    async fn delete_item(&self, id: ItemId) -> Result<(), StoreError>;

    /// Apply `entry` to its item and append it to the ledger, atomically.
    ///
    /// Returns the item as committed.
    async fn commit_movement(
        &self,
        entry: &LedgerEntry,
        expected: ExpectedVersion,
    ) -> Result<Item, StoreError>;

    /// Full ledger for one item, oldest first (reconciliation).
    async fn ledger_entries(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Filtered ledger page, most recent first.
    async fn query_ledger(
        &self,
        filter: &LedgerFilter,
        window: PageWindow,
    ) -> Result<Page<LedgerEntry>, StoreError>;

    /// `in`/`out` sums per project over the whole ledger.
    async fn project_totals(&self) -> Result<Vec<ProjectTotals>, StoreError>;
}

/// Categories, locations and projects.
///
/// ## Deletion
///
/// - a category may always go; items pointing at it become uncategorized
/// - a location referenced by ledger entries is kept (`Conflict`); projects
///   using it as their home location lose that link
/// - a project referenced by ledger entries is kept (`Conflict`)
///
/// Updates replace the whole row and fail with `NotFound` for unknown ids.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    async fn update_category(&self, category: &Category) -> Result<(), StoreError>;
    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError>;

    async fn insert_location(&self, location: &Location) -> Result<(), StoreError>;
    async fn get_location(&self, id: LocationId) -> Result<Option<Location>, StoreError>;
    async fn list_locations(&self) -> Result<Vec<Location>, StoreError>;
    async fn update_location(&self, location: &Location) -> Result<(), StoreError>;
    async fn delete_location(&self, id: LocationId) -> Result<(), StoreError>;

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError>;
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;
    async fn update_project(&self, project: &Project) -> Result<(), StoreError>;
    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError>;
}

/// A complete backend: item ledger plus reference catalog.
pub trait Store: InventoryStore + CatalogStore {}

impl<T> Store for T where T: InventoryStore + CatalogStore + ?Sized {}

#[async_trait::async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn insert_item(
        &self,
        item: &Item,
        opening: Option<&LedgerEntry>,
    ) -> Result<Item, StoreError> {
        (**self).insert_item(item, opening).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        (**self).get_item(id).await
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        (**self).list_items(filter).await
    }

    async fn update_details(&self, id: ItemId, details: &ItemDetails) -> Result<Item, StoreError> {
        (**self).update_details(id, details).await
    }

    async fn set_reorder_level(&self, id: ItemId, level: i64) -> Result<Item, StoreError> {
        (**self).set_reorder_level(id, level).await
    }

    async fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        (**self).delete_item(id).await
    }

    async fn commit_movement(
        &self,
        entry: &LedgerEntry,
        expected: ExpectedVersion,
    ) -> Result<Item, StoreError> {
        (**self).commit_movement(entry, expected).await
    }

    async fn ledger_entries(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).ledger_entries(item_id).await
    }

    async fn query_ledger(
        &self,
        filter: &LedgerFilter,
        window: PageWindow,
    ) -> Result<Page<LedgerEntry>, StoreError> {
        (**self).query_ledger(filter, window).await
    }

    async fn project_totals(&self) -> Result<Vec<ProjectTotals>, StoreError> {
        (**self).project_totals().await
    }
}

#[async_trait::async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        (**self).insert_category(category).await
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        (**self).get_category(id).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        (**self).list_categories().await
    }

    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        (**self).update_category(category).await
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError> {
        (**self).delete_category(id).await
    }

    async fn insert_location(&self, location: &Location) -> Result<(), StoreError> {
        (**self).insert_location(location).await
    }

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        (**self).get_location(id).await
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        (**self).list_locations().await
    }

    async fn update_location(&self, location: &Location) -> Result<(), StoreError> {
        (**self).update_location(location).await
    }

    async fn delete_location(&self, id: LocationId) -> Result<(), StoreError> {
        (**self).delete_location(id).await
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        (**self).insert_project(project).await
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        (**self).get_project(id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        (**self).list_projects().await
    }

    async fn update_project(&self, project: &Project) -> Result<(), StoreError> {
        (**self).update_project(project).await
    }

    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        (**self).delete_project(id).await
    }
}
