//! `LedgerService`: the library's public operation surface.
//!
//! Every operation takes an explicit [`RequestContext`]. Mutations authorize,
//! validate, write, then audit; reads authorize and clamp their page window.

use chrono::Utc;
use tracing::instrument;

use sitestock_audit::{ActionKind, AuditFilter, AuditRecord, TargetType};
use sitestock_auth::{authorize, Permission, RequestContext};
use sitestock_core::{
    Aggregate, AggregateRoot, CategoryId, DomainError, EntryId, ItemId, LocationId, Page,
    PageWindow, ProjectId,
};
use sitestock_inventory::{
    check_reorder_level, replay_quantity, Category, InventorySummary, Item, ItemDetails,
    ItemFilter, LedgerEntry, LedgerFilter, Location, MovementKind, NewCategory, NewItem,
    NewLocation, NewProject, Project, Reconciliation, RecordMovement,
};

use crate::audit_log::AuditLog;
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::processor::{movement_snapshot, MovementRequest, TransactionProcessor};
use crate::recorder::snapshot_of;
use crate::store::Store;

/// Note attached to the adjustment that books an item's starting stock.
pub const OPENING_BALANCE_NOTE: &str = "opening balance";

/// Ledger entries shown on the dashboard summary.
pub const RECENT_MOVEMENTS: u32 = 5;

pub struct LedgerService<S, A> {
    processor: TransactionProcessor<S, A>,
    default_page_size: u32,
    max_page_size: u32,
}

impl<S, A> LedgerService<S, A>
where
    S: Store,
    A: AuditLog,
{
    pub fn new(store: S, audit_log: A, config: &LedgerConfig) -> Self {
        Self {
            processor: TransactionProcessor::new(store, audit_log, config.max_commit_retries),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    pub fn processor(&self) -> &TransactionProcessor<S, A> {
        &self.processor
    }

    fn store(&self) -> &S {
        self.processor.store()
    }

    /// Audit writes that failed since startup.
    pub fn audit_failures(&self) -> u64 {
        self.processor.recorder().failure_count()
    }

    /// Page window from raw query parameters, clamped to the configured maximum.
    pub fn window(&self, offset: Option<u32>, limit: Option<u32>) -> PageWindow {
        PageWindow::from_params(offset, limit, self.default_page_size, self.max_page_size)
    }

    fn clamp(&self, window: PageWindow) -> PageWindow {
        self.window(Some(window.offset), Some(window.limit))
    }

    async fn audit(
        &self,
        ctx: &RequestContext,
        action: ActionKind,
        target_type: TargetType,
        target_id: impl core::fmt::Display,
        snapshot: serde_json::Value,
    ) {
        self.processor
            .recorder()
            .record(ctx.user_id(), action, target_type, target_id, snapshot)
            .await;
    }

    async fn check_category(&self, category_id: Option<CategoryId>) -> LedgerResult<()> {
        if let Some(id) = category_id {
            if self.store().get_category(id).await?.is_none() {
                return Err(DomainError::reference_not_found("category", id).into());
            }
        }
        Ok(())
    }

    async fn check_location(&self, location_id: Option<LocationId>) -> LedgerResult<()> {
        if let Some(id) = location_id {
            if self.store().get_location(id).await?.is_none() {
                return Err(DomainError::reference_not_found("location", id).into());
            }
        }
        Ok(())
    }

    async fn existing_category(&self, id: CategoryId) -> LedgerResult<Category> {
        Ok(self
            .store()
            .get_category(id)
            .await?
            .ok_or_else(|| DomainError::not_found("category", id))?)
    }

    async fn existing_location(&self, id: LocationId) -> LedgerResult<Location> {
        Ok(self
            .store()
            .get_location(id)
            .await?
            .ok_or_else(|| DomainError::not_found("location", id))?)
    }

    async fn existing_project(&self, id: ProjectId) -> LedgerResult<Project> {
        Ok(self
            .store()
            .get_project(id)
            .await?
            .ok_or_else(|| DomainError::not_found("project", id))?)
    }

    async fn existing_item(&self, id: ItemId) -> LedgerResult<Item> {
        Ok(self
            .store()
            .get_item(id)
            .await?
            .ok_or_else(|| DomainError::not_found("item", id))?)
    }

    // ----- items -----

    /// Create an item. A non-zero `initial_quantity` is booked as an opening
    /// adjustment so the ledger accounts for it. Item and opening entry are
    /// stored together or not at all.
    #[instrument(skip(self, ctx, spec), fields(actor_id = %ctx.user_id(), name = %spec.name), err)]
    pub async fn create_item(&self, ctx: &RequestContext, spec: NewItem) -> LedgerResult<Item> {
        authorize(ctx, Permission::InventoryWrite)?;
        spec.validate()?;
        self.check_category(spec.category_id).await?;

        let item = Item::create(ItemId::new(), &spec, Utc::now())?;
        let opening = if spec.initial_quantity > 0 {
            Some(item.decide(&RecordMovement {
                entry_id: EntryId::new(),
                item_id: item.id_typed(),
                kind: MovementKind::Adjustment,
                quantity: spec.initial_quantity,
                location_id: None,
                project_id: None,
                actor_id: ctx.user_id(),
                note: Some(OPENING_BALANCE_NOTE.to_string()),
                occurred_at: item.created_at(),
            })?)
        } else {
            None
        };
        let item = self.store().insert_item(&item, opening.as_ref()).await?;

        self.audit(ctx, ActionKind::Create, TargetType::Items, item.id_typed(), snapshot_of(&item))
            .await;
        if let Some(entry) = &opening {
            self.audit(
                ctx,
                ActionKind::Create,
                TargetType::InventoryTransactions,
                entry.id,
                movement_snapshot(entry),
            )
            .await;
        }
        Ok(item)
    }

    pub async fn get_item(&self, ctx: &RequestContext, id: ItemId) -> LedgerResult<Item> {
        authorize(ctx, Permission::InventoryRead)?;
        self.existing_item(id).await
    }

    pub async fn list_items(&self, ctx: &RequestContext, filter: &ItemFilter) -> LedgerResult<Vec<Item>> {
        authorize(ctx, Permission::InventoryRead)?;
        Ok(self.store().list_items(filter).await?)
    }

    /// Replace descriptive fields. Quantity is never touched here.
    #[instrument(skip(self, ctx, details), fields(actor_id = %ctx.user_id(), item_id = %id), err)]
    pub async fn update_item(
        &self,
        ctx: &RequestContext,
        id: ItemId,
        details: ItemDetails,
    ) -> LedgerResult<Item> {
        authorize(ctx, Permission::InventoryWrite)?;
        details.validate()?;
        self.check_category(details.category_id).await?;

        let item = self.store().update_details(id, &details).await?;
        self.audit(ctx, ActionKind::Update, TargetType::Items, id, snapshot_of(&item))
            .await;
        Ok(item)
    }

    #[instrument(skip(self, ctx), fields(actor_id = %ctx.user_id(), item_id = %id), err)]
    pub async fn set_threshold(
        &self,
        ctx: &RequestContext,
        id: ItemId,
        level: i64,
    ) -> LedgerResult<Item> {
        authorize(ctx, Permission::InventoryWrite)?;
        check_reorder_level(level)?;

        let item = self.store().set_reorder_level(id, level).await?;
        self.audit(ctx, ActionKind::Update, TargetType::Items, id, snapshot_of(&item))
            .await;
        Ok(item)
    }

    /// Delete an item that has never moved. Items with ledger history are kept.
    #[instrument(skip(self, ctx), fields(actor_id = %ctx.user_id(), item_id = %id), err)]
    pub async fn delete_item(&self, ctx: &RequestContext, id: ItemId) -> LedgerResult<()> {
        authorize(ctx, Permission::InventoryWrite)?;
        let item = self.existing_item(id).await?;

        // Hold the item lock so no movement slips in between check and delete.
        let guard = self.processor.locks().acquire(id).await;
        self.store().delete_item(id).await?;
        drop(guard);

        self.audit(ctx, ActionKind::Delete, TargetType::Items, id, snapshot_of(&item))
            .await;
        Ok(())
    }

    // ----- movements & ledger -----

    pub async fn apply_movement(
        &self,
        ctx: &RequestContext,
        req: MovementRequest,
    ) -> LedgerResult<LedgerEntry> {
        self.processor.apply_movement(ctx, req).await
    }

    /// One item's ledger, most recent first.
    pub async fn list_ledger(
        &self,
        ctx: &RequestContext,
        item_id: ItemId,
        window: PageWindow,
    ) -> LedgerResult<Page<LedgerEntry>> {
        authorize(ctx, Permission::InventoryRead)?;
        self.existing_item(item_id).await?;
        Ok(self
            .store()
            .query_ledger(&LedgerFilter::for_item(item_id), self.clamp(window))
            .await?)
    }

    /// Ledger across items, most recent first.
    pub async fn list_movements(
        &self,
        ctx: &RequestContext,
        filter: &LedgerFilter,
        window: PageWindow,
    ) -> LedgerResult<Page<LedgerEntry>> {
        authorize(ctx, Permission::InventoryRead)?;
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from >= to {
                return Err(DomainError::validation("date range start must precede its end").into());
            }
        }
        Ok(self.store().query_ledger(filter, self.clamp(window)).await?)
    }

    /// Re-derive an item's quantity from its ledger and compare with the stored value.
    #[instrument(skip(self, ctx), fields(item_id = %item_id), err)]
    pub async fn reconcile(&self, ctx: &RequestContext, item_id: ItemId) -> LedgerResult<Reconciliation> {
        authorize(ctx, Permission::InventoryRead)?;

        let (item, entries) = {
            let _guard = self.processor.locks().acquire(item_id).await;
            let item = self.existing_item(item_id).await?;
            let entries = self.store().ledger_entries(item_id).await?;
            (item, entries)
        };

        let report = Reconciliation {
            item_id,
            stored_quantity: item.current_quantity(),
            ledger_quantity: replay_quantity(&entries),
            entry_count: entries.len() as u64,
            version: item.version(),
        };
        if !report.is_consistent() {
            tracing::error!(
                item_id = %item_id,
                stored = report.stored_quantity,
                ledger = report.ledger_quantity,
                drift = report.drift(),
                "stored quantity disagrees with ledger"
            );
        }
        Ok(report)
    }

    // ----- catalog -----

    #[instrument(skip(self, ctx, spec), fields(actor_id = %ctx.user_id()), err)]
    pub async fn create_category(&self, ctx: &RequestContext, spec: NewCategory) -> LedgerResult<Category> {
        authorize(ctx, Permission::CatalogWrite)?;
        let category = Category::create(CategoryId::new(), &spec, Utc::now())?;
        self.store().insert_category(&category).await?;
        self.audit(ctx, ActionKind::Create, TargetType::Categories, category.id, snapshot_of(&category))
            .await;
        Ok(category)
    }

    pub async fn get_category(&self, ctx: &RequestContext, id: CategoryId) -> LedgerResult<Category> {
        authorize(ctx, Permission::InventoryRead)?;
        self.existing_category(id).await
    }

    pub async fn list_categories(&self, ctx: &RequestContext) -> LedgerResult<Vec<Category>> {
        authorize(ctx, Permission::InventoryRead)?;
        Ok(self.store().list_categories().await?)
    }

    #[instrument(skip(self, ctx, changes), fields(actor_id = %ctx.user_id(), category_id = %id), err)]
    pub async fn update_category(
        &self,
        ctx: &RequestContext,
        id: CategoryId,
        changes: NewCategory,
    ) -> LedgerResult<Category> {
        authorize(ctx, Permission::CatalogWrite)?;
        let mut category = self.existing_category(id).await?;
        category.update(&changes)?;
        self.store().update_category(&category).await?;
        self.audit(ctx, ActionKind::Update, TargetType::Categories, id, snapshot_of(&category))
            .await;
        Ok(category)
    }

    /// Delete a category. Its items stay and become uncategorized.
    #[instrument(skip(self, ctx), fields(actor_id = %ctx.user_id(), category_id = %id), err)]
    pub async fn delete_category(&self, ctx: &RequestContext, id: CategoryId) -> LedgerResult<()> {
        authorize(ctx, Permission::CatalogWrite)?;
        let category = self.existing_category(id).await?;
        self.store().delete_category(id).await?;
        self.audit(ctx, ActionKind::Delete, TargetType::Categories, id, snapshot_of(&category))
            .await;
        Ok(())
    }

    #[instrument(skip(self, ctx, spec), fields(actor_id = %ctx.user_id()), err)]
    pub async fn create_location(&self, ctx: &RequestContext, spec: NewLocation) -> LedgerResult<Location> {
        authorize(ctx, Permission::CatalogWrite)?;
        let location = Location::create(LocationId::new(), &spec, Utc::now())?;
        self.store().insert_location(&location).await?;
        self.audit(ctx, ActionKind::Create, TargetType::Locations, location.id, snapshot_of(&location))
            .await;
        Ok(location)
    }

    pub async fn get_location(&self, ctx: &RequestContext, id: LocationId) -> LedgerResult<Location> {
        authorize(ctx, Permission::InventoryRead)?;
        self.existing_location(id).await
    }

    pub async fn list_locations(&self, ctx: &RequestContext) -> LedgerResult<Vec<Location>> {
        authorize(ctx, Permission::InventoryRead)?;
        Ok(self.store().list_locations().await?)
    }

    #[instrument(skip(self, ctx, changes), fields(actor_id = %ctx.user_id(), location_id = %id), err)]
    pub async fn update_location(
        &self,
        ctx: &RequestContext,
        id: LocationId,
        changes: NewLocation,
    ) -> LedgerResult<Location> {
        authorize(ctx, Permission::CatalogWrite)?;
        let mut location = self.existing_location(id).await?;
        location.update(&changes)?;
        self.store().update_location(&location).await?;
        self.audit(ctx, ActionKind::Update, TargetType::Locations, id, snapshot_of(&location))
            .await;
        Ok(location)
    }

    /// Delete a location no movement has used. Projects based there lose
    /// their home location.
    #[instrument(skip(self, ctx), fields(actor_id = %ctx.user_id(), location_id = %id), err)]
    pub async fn delete_location(&self, ctx: &RequestContext, id: LocationId) -> LedgerResult<()> {
        authorize(ctx, Permission::CatalogWrite)?;
        let location = self.existing_location(id).await?;
        self.store().delete_location(id).await?;
        self.audit(ctx, ActionKind::Delete, TargetType::Locations, id, snapshot_of(&location))
            .await;
        Ok(())
    }

    #[instrument(skip(self, ctx, spec), fields(actor_id = %ctx.user_id(), code = %spec.code), err)]
    pub async fn create_project(&self, ctx: &RequestContext, spec: NewProject) -> LedgerResult<Project> {
        authorize(ctx, Permission::CatalogWrite)?;
        self.check_location(spec.location_id).await?;
        let project = Project::create(ProjectId::new(), &spec, Utc::now())?;
        self.store().insert_project(&project).await?;
        self.audit(ctx, ActionKind::Create, TargetType::Projects, project.id, snapshot_of(&project))
            .await;
        Ok(project)
    }

    pub async fn get_project(&self, ctx: &RequestContext, id: ProjectId) -> LedgerResult<Project> {
        authorize(ctx, Permission::InventoryRead)?;
        self.existing_project(id).await
    }

    pub async fn list_projects(&self, ctx: &RequestContext) -> LedgerResult<Vec<Project>> {
        authorize(ctx, Permission::InventoryRead)?;
        Ok(self.store().list_projects().await?)
    }

    #[instrument(skip(self, ctx, changes), fields(actor_id = %ctx.user_id(), project_id = %id), err)]
    pub async fn update_project(
        &self,
        ctx: &RequestContext,
        id: ProjectId,
        changes: NewProject,
    ) -> LedgerResult<Project> {
        authorize(ctx, Permission::CatalogWrite)?;
        let mut project = self.existing_project(id).await?;
        project.update(&changes)?;
        self.check_location(project.location_id).await?;
        self.store().update_project(&project).await?;
        self.audit(ctx, ActionKind::Update, TargetType::Projects, id, snapshot_of(&project))
            .await;
        Ok(project)
    }

    /// Delete a project no movement has been booked against.
    #[instrument(skip(self, ctx), fields(actor_id = %ctx.user_id(), project_id = %id), err)]
    pub async fn delete_project(&self, ctx: &RequestContext, id: ProjectId) -> LedgerResult<()> {
        authorize(ctx, Permission::CatalogWrite)?;
        let project = self.existing_project(id).await?;
        self.store().delete_project(id).await?;
        self.audit(ctx, ActionKind::Delete, TargetType::Projects, id, snapshot_of(&project))
            .await;
        Ok(())
    }

    // ----- dashboard -----

    /// Headline counts, per-category item counts, recent movements and
    /// per-project usage for active projects.
    #[instrument(skip(self, ctx), fields(actor_id = %ctx.user_id()), err)]
    pub async fn summary(&self, ctx: &RequestContext) -> LedgerResult<InventorySummary> {
        authorize(ctx, Permission::InventoryRead)?;
        let store = self.store();
        let items = store.list_items(&ItemFilter::default()).await?;
        let categories = store.list_categories().await?;
        let projects = store.list_projects().await?;
        let locations = store.list_locations().await?;
        let recent = store
            .query_ledger(&LedgerFilter::default(), PageWindow::new(0, RECENT_MOVEMENTS))
            .await?;
        let totals = store.project_totals().await?;

        Ok(InventorySummary::compile(
            &items,
            &categories,
            &projects,
            locations.len(),
            recent,
            &totals,
        ))
    }

    // ----- audit -----

    /// Audit history, most recent first. Admin only.
    pub async fn list_audit(
        &self,
        ctx: &RequestContext,
        filter: &AuditFilter,
        window: PageWindow,
    ) -> LedgerResult<Page<AuditRecord>> {
        authorize(ctx, Permission::AuditRead)?;
        Ok(self
            .processor
            .recorder()
            .log()
            .query(filter, self.clamp(window))
            .await?)
    }
}

impl<S, A> core::fmt::Debug for LedgerService<S, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LedgerService")
            .field("processor", &self.processor)
            .field("default_page_size", &self.default_page_size)
            .field("max_page_size", &self.max_page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sitestock_auth::Actor;
    use sitestock_core::UserId;

    use crate::audit_log::InMemoryAuditLog;
    use crate::error::LedgerServiceError;
    use crate::store::InMemoryStore;
    use crate::test_support::{ConflictingStore, FailingAuditLog};

    type MemService = LedgerService<InMemoryStore, InMemoryAuditLog>;

    fn service() -> MemService {
        LedgerService::new(InMemoryStore::new(), InMemoryAuditLog::new(), &LedgerConfig::default())
    }

    fn staff() -> RequestContext {
        RequestContext::new(Actor::staff(UserId::new()))
    }

    fn admin() -> RequestContext {
        RequestContext::new(Actor::admin(UserId::new()))
    }

    fn new_item(initial_quantity: i64, reorder_level: i64) -> NewItem {
        NewItem {
            name: "Cement 25kg".to_string(),
            unit: "bag".to_string(),
            sku: Some("CEM-25".to_string()),
            description: Some("Portland cement".to_string()),
            category_id: None,
            initial_quantity,
            reorder_level,
        }
    }

    fn movement(item_id: ItemId, kind: MovementKind, quantity: i64) -> MovementRequest {
        MovementRequest {
            item_id,
            kind,
            quantity,
            location_id: None,
            project_id: None,
            note: None,
        }
    }

    fn domain(err: &LedgerServiceError) -> &DomainError {
        err.as_domain().unwrap()
    }

    #[tokio::test]
    async fn stock_scenario() {
        let svc = service();
        let ctx = staff();

        let item = svc.create_item(&ctx, new_item(10, 5)).await.unwrap();
        let id = item.id_typed();
        assert_eq!(item.current_quantity(), 10);

        let e = svc.apply_movement(&ctx, movement(id, MovementKind::In, 5)).await.unwrap();
        assert_eq!((e.delta, e.resulting_quantity), (5, 15));

        let err = svc
            .apply_movement(&ctx, movement(id, MovementKind::Out, 20))
            .await
            .unwrap_err();
        assert_eq!(
            domain(&err),
            &DomainError::InsufficientStock { available: 15, requested: 20 }
        );
        assert_eq!(svc.get_item(&ctx, id).await.unwrap().current_quantity(), 15);

        let e = svc
            .apply_movement(&ctx, movement(id, MovementKind::Adjustment, 3))
            .await
            .unwrap();
        assert_eq!((e.delta, e.resulting_quantity), (-12, 3));

        let ledger = svc.list_ledger(&ctx, id, PageWindow::default()).await.unwrap();
        assert_eq!(ledger.total, 3);
        let deltas: Vec<i64> = ledger.items.iter().map(|e| e.delta).collect();
        assert_eq!(deltas, vec![-12, 5, 10]);
        assert_eq!(ledger.items[2].note.as_deref(), Some(OPENING_BALANCE_NOTE));

        let report = svc.reconcile(&ctx, id).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.stored_quantity, 3);
        assert_eq!(report.entry_count, 3);
    }

    #[tokio::test]
    async fn invalid_quantities_are_rejected() {
        let svc = service();
        let ctx = staff();
        let id = svc.create_item(&ctx, new_item(2, 0)).await.unwrap().id_typed();

        for (kind, qty) in [
            (MovementKind::In, 0),
            (MovementKind::Out, -1),
            (MovementKind::Adjustment, -5),
        ] {
            let err = svc.apply_movement(&ctx, movement(id, kind, qty)).await.unwrap_err();
            assert!(matches!(domain(&err), DomainError::InvalidQuantity(_)), "{kind} {qty}");
        }

        let out_all = svc.apply_movement(&ctx, movement(id, MovementKind::Out, 2)).await.unwrap();
        assert_eq!(out_all.resulting_quantity, 0);
    }

    #[tokio::test]
    async fn every_mutation_is_audited() {
        let svc = service();
        let ctx = staff();

        let loc = svc
            .create_location(&ctx, NewLocation {
                name: "Main Yard".to_string(),
                address: None,
                kind: Default::default(),
            })
            .await
            .unwrap();
        let item = svc.create_item(&ctx, new_item(0, 1)).await.unwrap();
        let id = item.id_typed();
        svc.set_threshold(&ctx, id, 4).await.unwrap();

        let mut req = movement(id, MovementKind::In, 6);
        req.location_id = Some(loc.id);
        svc.apply_movement(&ctx, req).await.unwrap();

        let page = svc
            .list_audit(&admin(), &AuditFilter::default(), PageWindow::default())
            .await
            .unwrap();
        assert_eq!(page.total, 4);

        let movements = svc
            .list_audit(
                &admin(),
                &AuditFilter {
                    target_type: Some(TargetType::InventoryTransactions),
                    ..AuditFilter::default()
                },
                PageWindow::default(),
            )
            .await
            .unwrap();
        assert_eq!(movements.total, 1);
        assert_eq!(movements.items[0].snapshot["resulting_quantity"], 6);
        assert_eq!(movements.items[0].actor_id, ctx.user_id());
    }

    #[tokio::test]
    async fn audit_is_admin_only() {
        let svc = service();
        let err = svc
            .list_audit(&staff(), &AuditFilter::default(), PageWindow::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn failing_audit_sink_keeps_mutations() {
        let svc = LedgerService::new(InMemoryStore::new(), FailingAuditLog, &LedgerConfig::default());
        let ctx = staff();

        let item = svc.create_item(&ctx, new_item(5, 0)).await.unwrap();
        svc.apply_movement(&ctx, movement(item.id_typed(), MovementKind::Out, 2))
            .await
            .unwrap();

        // item create + opening adjustment + out
        assert_eq!(svc.audit_failures(), 3);
        assert_eq!(svc.get_item(&ctx, item.id_typed()).await.unwrap().current_quantity(), 3);
    }

    #[tokio::test]
    async fn delete_only_without_history() {
        let svc = service();
        let ctx = staff();

        let moved = svc.create_item(&ctx, new_item(1, 0)).await.unwrap();
        let err = svc.delete_item(&ctx, moved.id_typed()).await.unwrap_err();
        assert!(matches!(domain(&err), DomainError::Conflict(_)));

        let fresh = svc.create_item(&ctx, new_item(0, 0)).await.unwrap();
        svc.delete_item(&ctx, fresh.id_typed()).await.unwrap();
        let err = svc.get_item(&ctx, fresh.id_typed()).await.unwrap_err();
        assert!(matches!(domain(&err), DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn category_reference_must_exist() {
        let svc = service();
        let ctx = staff();

        let mut spec = new_item(0, 0);
        spec.category_id = Some(CategoryId::new());
        let err = svc.create_item(&ctx, spec).await.unwrap_err();
        assert!(matches!(
            domain(&err),
            DomainError::ReferenceNotFound { entity: "category", .. }
        ));
        assert!(svc.list_items(&ctx, &ItemFilter::default()).await.unwrap().is_empty());

        let cat = svc
            .create_category(&ctx, NewCategory {
                name: "Aggregates".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let mut spec = new_item(0, 0);
        spec.category_id = Some(cat.id);
        let item = svc.create_item(&ctx, spec).await.unwrap();

        let filter = ItemFilter {
            category_id: Some(cat.id),
            ..ItemFilter::default()
        };
        let listed = svc.list_items(&ctx, &filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id_typed(), item.id_typed());
    }

    #[tokio::test]
    async fn update_and_threshold_leave_quantity_alone() {
        let svc = service();
        let ctx = staff();
        let id = svc.create_item(&ctx, new_item(7, 2)).await.unwrap().id_typed();

        let updated = svc
            .update_item(&ctx, id, ItemDetails {
                name: "Cement 40kg".to_string(),
                unit: "bag".to_string(),
                sku: None,
                description: None,
                category_id: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.name(), "Cement 40kg");
        assert_eq!(updated.current_quantity(), 7);

        let err = svc.set_threshold(&ctx, id, -1).await.unwrap_err();
        assert!(matches!(domain(&err), DomainError::Validation(_)));

        let item = svc.set_threshold(&ctx, id, 7).await.unwrap();
        assert!(item.is_low_stock());
        let low = svc
            .list_items(&ctx, &ItemFilter { low_stock_only: true, ..ItemFilter::default() })
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
    }

    #[tokio::test]
    async fn list_movements_filters_across_items() {
        let svc = service();
        let ctx = staff();
        let a = svc.create_item(&ctx, new_item(0, 0)).await.unwrap().id_typed();
        let b = svc.create_item(&ctx, new_item(0, 0)).await.unwrap().id_typed();

        svc.apply_movement(&ctx, movement(a, MovementKind::In, 3)).await.unwrap();
        svc.apply_movement(&ctx, movement(b, MovementKind::In, 4)).await.unwrap();
        svc.apply_movement(&ctx, movement(b, MovementKind::Out, 1)).await.unwrap();

        let ins = svc
            .list_movements(
                &ctx,
                &LedgerFilter { kind: Some(MovementKind::In), ..LedgerFilter::default() },
                PageWindow::default(),
            )
            .await
            .unwrap();
        assert_eq!(ins.total, 2);

        let only_b = svc
            .list_movements(&ctx, &LedgerFilter::for_item(b), PageWindow::new(0, 1))
            .await
            .unwrap();
        assert_eq!(only_b.total, 2);
        assert_eq!(only_b.items[0].kind, MovementKind::Out);
        assert!(only_b.has_more());
    }

    #[tokio::test]
    async fn page_limits_are_clamped() {
        let cfg = LedgerConfig {
            max_page_size: 2,
            default_page_size: 2,
            ..LedgerConfig::default()
        };
        let svc = LedgerService::new(InMemoryStore::new(), InMemoryAuditLog::new(), &cfg);
        let ctx = staff();
        let id = svc.create_item(&ctx, new_item(0, 0)).await.unwrap().id_typed();
        for _ in 0..5 {
            svc.apply_movement(&ctx, movement(id, MovementKind::In, 1)).await.unwrap();
        }

        let page = svc.list_ledger(&ctx, id, PageWindow::new(0, 500)).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.window.limit, 2);
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn ledger_of_unknown_item_is_not_found() {
        let svc = service();
        let err = svc
            .list_ledger(&staff(), ItemId::new(), PageWindow::default())
            .await
            .unwrap_err();
        assert!(matches!(domain(&err), DomainError::NotFound { entity: "item", .. }));
    }

    #[tokio::test]
    async fn opening_stock_is_all_or_nothing() {
        let svc = LedgerService::new(
            ConflictingStore::new(InMemoryStore::new()),
            InMemoryAuditLog::new(),
            &LedgerConfig::default(),
        );
        let ctx = staff();

        let err = svc.create_item(&ctx, new_item(5, 0)).await.unwrap_err();
        assert!(matches!(domain(&err), DomainError::ConcurrentModification(_)));
        assert!(svc.list_items(&ctx, &ItemFilter::default()).await.unwrap().is_empty());
        let audit = svc
            .list_audit(&admin(), &AuditFilter::default(), PageWindow::default())
            .await
            .unwrap();
        assert_eq!(audit.total, 0);

        // No opening entry, nothing to race on.
        let empty = svc.create_item(&ctx, new_item(0, 0)).await.unwrap();
        assert_eq!(empty.version(), 0);
    }

    #[tokio::test]
    async fn opening_entry_is_audited_with_the_item() {
        let svc = service();
        let ctx = staff();
        let item = svc.create_item(&ctx, new_item(8, 0)).await.unwrap();
        assert_eq!(item.version(), 1);

        let opening = svc
            .list_audit(
                &admin(),
                &AuditFilter {
                    target_type: Some(TargetType::InventoryTransactions),
                    ..AuditFilter::default()
                },
                PageWindow::default(),
            )
            .await
            .unwrap();
        assert_eq!(opening.total, 1);
        assert_eq!(opening.items[0].snapshot["previous_quantity"], 0);
        assert_eq!(opening.items[0].snapshot["resulting_quantity"], 8);
        assert_eq!(opening.items[0].snapshot["note"], OPENING_BALANCE_NOTE);
    }

    #[tokio::test]
    async fn category_update_and_delete_are_audited() {
        let svc = service();
        let ctx = staff();
        let cat = svc
            .create_category(&ctx, NewCategory { name: "Fixings".to_string(), description: None })
            .await
            .unwrap();
        let mut spec = new_item(0, 0);
        spec.category_id = Some(cat.id);
        let item = svc.create_item(&ctx, spec).await.unwrap();

        let renamed = svc
            .update_category(&ctx, cat.id, NewCategory {
                name: "Fasteners".to_string(),
                description: Some("screws, bolts".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(renamed.name, "Fasteners");
        assert_eq!(renamed.created_at, cat.created_at);

        svc.delete_category(&ctx, cat.id).await.unwrap();
        let item = svc.get_item(&ctx, item.id_typed()).await.unwrap();
        assert_eq!(item.category_id(), None);

        let err = svc.get_category(&ctx, cat.id).await.unwrap_err();
        assert!(matches!(domain(&err), DomainError::NotFound { entity: "category", .. }));

        for action in [ActionKind::Update, ActionKind::Delete] {
            let page = svc
                .list_audit(
                    &admin(),
                    &AuditFilter {
                        action: Some(action),
                        target_type: Some(TargetType::Categories),
                        ..AuditFilter::default()
                    },
                    PageWindow::default(),
                )
                .await
                .unwrap();
            assert_eq!(page.total, 1, "{action:?}");
            assert_eq!(page.items[0].target_id, cat.id.to_string());
        }
    }

    #[tokio::test]
    async fn locations_and_projects_in_use_are_kept() {
        let svc = service();
        let ctx = staff();
        let yard = svc
            .create_location(&ctx, NewLocation {
                name: "East yard".to_string(),
                address: None,
                kind: Default::default(),
            })
            .await
            .unwrap();
        let project = svc
            .create_project(&ctx, NewProject {
                name: "Bridge deck".to_string(),
                code: "BD-01".to_string(),
                description: None,
                status: Default::default(),
                location_id: Some(yard.id),
            })
            .await
            .unwrap();
        let id = svc.create_item(&ctx, new_item(0, 0)).await.unwrap().id_typed();
        let mut req = movement(id, MovementKind::In, 3);
        req.location_id = Some(yard.id);
        req.project_id = Some(project.id);
        svc.apply_movement(&ctx, req).await.unwrap();

        let err = svc.delete_location(&ctx, yard.id).await.unwrap_err();
        assert!(matches!(domain(&err), DomainError::Conflict(_)));
        let err = svc.delete_project(&ctx, project.id).await.unwrap_err();
        assert!(matches!(domain(&err), DomainError::Conflict(_)));

        let err = svc.delete_project(&ctx, ProjectId::new()).await.unwrap_err();
        assert!(matches!(domain(&err), DomainError::NotFound { entity: "project", .. }));

        // Pointing a project at a missing location is refused before any write.
        let err = svc
            .update_project(&ctx, project.id, NewProject {
                name: "Bridge deck".to_string(),
                code: "BD-01".to_string(),
                description: None,
                status: Default::default(),
                location_id: Some(LocationId::new()),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            domain(&err),
            DomainError::ReferenceNotFound { entity: "location", .. }
        ));
        assert_eq!(svc.get_project(&ctx, project.id).await.unwrap().location_id, Some(yard.id));
    }

    #[tokio::test]
    async fn summary_reports_dashboard_figures() {
        let svc = service();
        let ctx = staff();
        let tools = svc
            .create_category(&ctx, NewCategory { name: "Tools".to_string(), description: None })
            .await
            .unwrap();
        let site = svc
            .create_location(&ctx, NewLocation {
                name: "Site A".to_string(),
                address: None,
                kind: Default::default(),
            })
            .await
            .unwrap();
        let active = svc
            .create_project(&ctx, NewProject {
                name: "Tower".to_string(),
                code: "TW".to_string(),
                description: None,
                status: sitestock_inventory::ProjectStatus::Active,
                location_id: Some(site.id),
            })
            .await
            .unwrap();

        let mut spec = new_item(10, 2);
        spec.category_id = Some(tools.id);
        let drill = svc.create_item(&ctx, spec).await.unwrap().id_typed();
        svc.create_item(&ctx, new_item(0, 0)).await.unwrap();

        let mut req = movement(drill, MovementKind::Out, 4);
        req.project_id = Some(active.id);
        svc.apply_movement(&ctx, req).await.unwrap();
        let mut req = movement(drill, MovementKind::In, 1);
        req.project_id = Some(active.id);
        svc.apply_movement(&ctx, req).await.unwrap();

        let summary = svc.summary(&ctx).await.unwrap();
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.low_stock_items, 1);
        assert_eq!(summary.total_projects, 1);
        assert_eq!(summary.active_projects, 1);
        assert_eq!(summary.total_locations, 1);
        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.recent_movements.len(), 3);
        assert_eq!(summary.items_per_category[0].item_count, 1);
        assert_eq!(summary.uncategorized_items, 1);
        assert_eq!(summary.active_project_usage[0].total_in, 1);
        assert_eq!(summary.active_project_usage[0].total_out, 4);
    }
}
