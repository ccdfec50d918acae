use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use sitestock_core::{
    Aggregate, AggregateRoot, CategoryId, ExpectedVersion, ItemId, LocationId, Page, PageWindow,
    ProjectId,
};
use sitestock_inventory::{
    newest_first, Category, Item, ItemDetails, ItemFilter, LedgerEntry, LedgerFilter, Location,
    Project, ProjectTotals,
};

use super::r#trait::{check_opening, CatalogStore, InventoryStore, StoreError};

/// An item together with its ledger.
///
/// Both live behind the same lock so a commit is a single critical section.
#[derive(Debug)]
struct ItemSlot {
    item: Item,
    entries: Vec<LedgerEntry>,
}

/// In-memory backend.
///
/// Intended for tests/dev. Each item has its own lock; the outer map lock is
/// only held long enough to find or insert a slot.
///
/// Lock order: catalog maps (locations, projects, categories), then the item
/// map, then a single slot.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: RwLock<HashMap<ItemId, Arc<RwLock<ItemSlot>>>>,
    categories: RwLock<HashMap<CategoryId, Category>>,
    locations: RwLock<HashMap<LocationId, Location>>,
    projects: RwLock<HashMap<ProjectId, Project>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn missing_reference(entity: &str, id: impl core::fmt::Display) -> StoreError {
    StoreError::Conflict(format!("{entity} {id} does not exist"))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: ItemId) -> Result<Option<Arc<RwLock<ItemSlot>>>, StoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.get(&id).cloned())
    }

    fn existing_slot(&self, id: ItemId) -> Result<Arc<RwLock<ItemSlot>>, StoreError> {
        self.slot(id)?.ok_or_else(|| StoreError::not_found("item", id))
    }

    fn all_slots(&self) -> Result<Vec<Arc<RwLock<ItemSlot>>>, StoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.values().cloned().collect())
    }

    /// True when any ledger entry satisfies `pred`.
    fn ledger_mentions(&self, pred: impl Fn(&LedgerEntry) -> bool) -> Result<bool, StoreError> {
        for slot in self.all_slots()? {
            let slot = slot.read().map_err(|_| poisoned())?;
            if slot.entries.iter().any(&pred) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait::async_trait]
impl InventoryStore for InMemoryStore {
    async fn insert_item(
        &self,
        item: &Item,
        opening: Option<&LedgerEntry>,
    ) -> Result<Item, StoreError> {
        if item.version() != 0 || item.current_quantity() != 0 {
            return Err(StoreError::Conflict(
                "new items must start with zero stock and no history".to_string(),
            ));
        }
        let mut stored = item.clone();
        let mut entries = Vec::new();
        if let Some(entry) = opening {
            check_opening(item, entry)?;
            stored.apply(entry);
            entries.push(entry.clone());
        }

        let categories = self.categories.read().map_err(|_| poisoned())?;
        if let Some(category_id) = item.category_id() {
            if !categories.contains_key(&category_id) {
                return Err(missing_reference("category", category_id));
            }
        }
        let mut items = self.items.write().map_err(|_| poisoned())?;
        if items.contains_key(&item.id_typed()) {
            return Err(StoreError::Conflict(format!(
                "item {} already exists",
                item.id_typed()
            )));
        }
        items.insert(
            item.id_typed(),
            Arc::new(RwLock::new(ItemSlot {
                item: stored.clone(),
                entries,
            })),
        );
        Ok(stored)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        match self.slot(id)? {
            Some(slot) => {
                let slot = slot.read().map_err(|_| poisoned())?;
                Ok(Some(slot.item.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let mut out = Vec::new();
        for slot in self.all_slots()? {
            let slot = slot.read().map_err(|_| poisoned())?;
            if filter.matches(&slot.item) {
                out.push(slot.item.clone());
            }
        }
        out.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id_typed().cmp(&b.id_typed())));
        Ok(out)
    }

    async fn update_details(&self, id: ItemId, details: &ItemDetails) -> Result<Item, StoreError> {
        let categories = self.categories.read().map_err(|_| poisoned())?;
        if let Some(category_id) = details.category_id {
            if !categories.contains_key(&category_id) {
                return Err(missing_reference("category", category_id));
            }
        }
        let slot = self.existing_slot(id)?;
        let mut slot = slot.write().map_err(|_| poisoned())?;
        slot.item
            .update_details(details)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        Ok(slot.item.clone())
    }

    async fn set_reorder_level(&self, id: ItemId, level: i64) -> Result<Item, StoreError> {
        let slot = self.existing_slot(id)?;
        let mut slot = slot.write().map_err(|_| poisoned())?;
        slot.item
            .set_reorder_level(level)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        Ok(slot.item.clone())
    }

    async fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let slot = items
            .get(&id)
            .ok_or_else(|| StoreError::not_found("item", id))?;
        let has_history = !slot.read().map_err(|_| poisoned())?.entries.is_empty();
        if has_history {
            return Err(StoreError::Conflict(format!(
                "item {id} has ledger entries and cannot be deleted"
            )));
        }
        items.remove(&id);
        Ok(())
    }

    async fn commit_movement(
        &self,
        entry: &LedgerEntry,
        expected: ExpectedVersion,
    ) -> Result<Item, StoreError> {
        // Held until the entry lands so a concurrent delete cannot orphan it.
        let locations = self.locations.read().map_err(|_| poisoned())?;
        let projects = self.projects.read().map_err(|_| poisoned())?;
        if let Some(location_id) = entry.location_id {
            if !locations.contains_key(&location_id) {
                return Err(missing_reference("location", location_id));
            }
        }
        if let Some(project_id) = entry.project_id {
            if !projects.contains_key(&project_id) {
                return Err(missing_reference("project", project_id));
            }
        }

        let slot = self.existing_slot(entry.item_id)?;
        let mut slot = slot.write().map_err(|_| poisoned())?;

        let current = slot.item.version();
        if !expected.matches(current) {
            return Err(StoreError::VersionConflict(format!(
                "expected {expected:?}, found {current}"
            )));
        }
        if entry.sequence != current + 1 || entry.previous_quantity() != slot.item.current_quantity() {
            return Err(StoreError::VersionConflict(format!(
                "entry {} was decided against stale state (sequence {}, item version {current})",
                entry.id, entry.sequence
            )));
        }

        // Quantity and ledger change under the same guard.
        slot.item.apply(entry);
        slot.entries.push(entry.clone());
        Ok(slot.item.clone())
    }

    async fn ledger_entries(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError> {
        match self.slot(item_id)? {
            Some(slot) => Ok(slot.read().map_err(|_| poisoned())?.entries.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn query_ledger(
        &self,
        filter: &LedgerFilter,
        window: PageWindow,
    ) -> Result<Page<LedgerEntry>, StoreError> {
        let slots = match filter.item_id {
            Some(id) => self.slot(id)?.into_iter().collect(),
            None => self.all_slots()?,
        };

        let mut matched = Vec::new();
        for slot in slots {
            let slot = slot.read().map_err(|_| poisoned())?;
            matched.extend(slot.entries.iter().filter(|e| filter.matches(e)).cloned());
        }
        matched.sort_by(newest_first);

        Ok(Page::new(window.apply(&matched), matched.len() as u64, window))
    }

    async fn project_totals(&self) -> Result<Vec<ProjectTotals>, StoreError> {
        let mut entries = Vec::new();
        for slot in self.all_slots()? {
            let slot = slot.read().map_err(|_| poisoned())?;
            entries.extend(slot.entries.iter().filter(|e| e.project_id.is_some()).cloned());
        }
        Ok(sitestock_inventory::project_totals(&entries))
    }
}

fn insert_unique<K, V>(
    map: &RwLock<HashMap<K, V>>,
    id: K,
    value: &V,
    entity: &'static str,
) -> Result<(), StoreError>
where
    K: Eq + std::hash::Hash + core::fmt::Display,
    V: Clone,
{
    let mut map = map.write().map_err(|_| poisoned())?;
    if map.contains_key(&id) {
        return Err(StoreError::Conflict(format!("{entity} {id} already exists")));
    }
    map.insert(id, value.clone());
    Ok(())
}

fn replace_existing<K, V>(
    map: &RwLock<HashMap<K, V>>,
    id: K,
    value: &V,
    entity: &'static str,
) -> Result<(), StoreError>
where
    K: Eq + std::hash::Hash + core::fmt::Display,
    V: Clone,
{
    let mut map = map.write().map_err(|_| poisoned())?;
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(StoreError::not_found(entity, id)),
    }
}

fn sorted_by_name<K, V: Clone>(
    map: &RwLock<HashMap<K, V>>,
    name: impl Fn(&V) -> &str,
) -> Result<Vec<V>, StoreError> {
    let map = map.read().map_err(|_| poisoned())?;
    let mut out: Vec<V> = map.values().cloned().collect();
    out.sort_by(|a, b| name(a).cmp(name(b)));
    Ok(out)
}

/// Project codes are unique, mirroring the `projects.code` constraint.
fn check_code_free(projects: &HashMap<ProjectId, Project>, project: &Project) -> Result<(), StoreError> {
    let taken = projects
        .values()
        .any(|p| p.id != project.id && p.code == project.code);
    if taken {
        return Err(StoreError::Conflict(format!(
            "project code {} is already in use",
            project.code
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        insert_unique(&self.categories, category.id, category, "category")
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        Ok(self.categories.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        sorted_by_name(&self.categories, |c| c.name.as_str())
    }

    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        replace_existing(&self.categories, category.id, category, "category")
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError> {
        let mut categories = self.categories.write().map_err(|_| poisoned())?;
        if categories.remove(&id).is_none() {
            return Err(StoreError::not_found("category", id));
        }
        for slot in self.all_slots()? {
            let mut slot = slot.write().map_err(|_| poisoned())?;
            if slot.item.category_id() == Some(id) {
                slot.item.clear_category();
            }
        }
        Ok(())
    }

    async fn insert_location(&self, location: &Location) -> Result<(), StoreError> {
        insert_unique(&self.locations, location.id, location, "location")
    }

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        Ok(self.locations.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        sorted_by_name(&self.locations, |l| l.name.as_str())
    }

    async fn update_location(&self, location: &Location) -> Result<(), StoreError> {
        replace_existing(&self.locations, location.id, location, "location")
    }

    async fn delete_location(&self, id: LocationId) -> Result<(), StoreError> {
        let mut locations = self.locations.write().map_err(|_| poisoned())?;
        let mut projects = self.projects.write().map_err(|_| poisoned())?;
        if !locations.contains_key(&id) {
            return Err(StoreError::not_found("location", id));
        }
        if self.ledger_mentions(|e| e.location_id == Some(id))? {
            return Err(StoreError::Conflict(format!(
                "location {id} is referenced by inventory transactions"
            )));
        }
        locations.remove(&id);
        for project in projects.values_mut() {
            if project.location_id == Some(id) {
                project.location_id = None;
            }
        }
        Ok(())
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        let locations = self.locations.read().map_err(|_| poisoned())?;
        let mut projects = self.projects.write().map_err(|_| poisoned())?;
        if let Some(location_id) = project.location_id {
            if !locations.contains_key(&location_id) {
                return Err(missing_reference("location", location_id));
            }
        }
        if projects.contains_key(&project.id) {
            return Err(StoreError::Conflict(format!("project {} already exists", project.id)));
        }
        check_code_free(&projects, project)?;
        projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.read().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        sorted_by_name(&self.projects, |p| p.name.as_str())
    }

    async fn update_project(&self, project: &Project) -> Result<(), StoreError> {
        let locations = self.locations.read().map_err(|_| poisoned())?;
        let mut projects = self.projects.write().map_err(|_| poisoned())?;
        if !projects.contains_key(&project.id) {
            return Err(StoreError::not_found("project", project.id));
        }
        if let Some(location_id) = project.location_id {
            if !locations.contains_key(&location_id) {
                return Err(missing_reference("location", location_id));
            }
        }
        check_code_free(&projects, project)?;
        projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let mut projects = self.projects.write().map_err(|_| poisoned())?;
        if !projects.contains_key(&id) {
            return Err(StoreError::not_found("project", id));
        }
        if self.ledger_mentions(|e| e.project_id == Some(id))? {
            return Err(StoreError::Conflict(format!(
                "project {id} is referenced by inventory transactions"
            )));
        }
        projects.remove(&id);
        Ok(())
    }
}
