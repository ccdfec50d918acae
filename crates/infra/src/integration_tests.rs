//! Integration tests for the Postgres backend.
//!
//! Tests: TransactionProcessor → PgStore → Postgres (row locks, constraints)
//!
//! Verifies:
//! - Concurrent outs through two independent pools never oversell
//! - A commit decided against stale state is rejected without side effects
//! - An item and its opening entry are written together or not at all
//! - Catalog deletes follow the reference rules against real foreign keys
//!
//! Needs a scratch database in `DATABASE_URL`; without it every test returns
//! early.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use sitestock_auth::{Actor, RequestContext};
    use sitestock_core::{
        Aggregate, AggregateRoot, CategoryId, DomainError, EntryId, ExpectedVersion, ItemId,
        LocationId, ProjectId, UserId,
    };
    use sitestock_inventory::{
        Category, Item, ItemDetails, LedgerEntry, Location, LocationKind, MovementKind,
        NewCategory, NewItem, NewLocation, NewProject, Project, ProjectStatus, RecordMovement,
    };

    use crate::audit_log::InMemoryAuditLog;
    use crate::processor::{MovementRequest, TransactionProcessor};
    use crate::store::postgres::{connect, migrate};
    use crate::store::{CatalogStore, InventoryStore, PgStore, StoreError};

    /// A store on its own pool, or `None` when no database is configured.
    async fn pg_store() -> Option<PgStore> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("DATABASE_URL not set; skipping postgres integration test");
                return None;
            }
        };
        let pool = connect(&url, 8).await.expect("connect to DATABASE_URL");
        migrate(&pool).await.expect("apply schema");
        Some(PgStore::new(pool))
    }

    fn staff() -> RequestContext {
        RequestContext::new(Actor::staff(UserId::new()))
    }

    fn new_item(name: &str) -> Item {
        let spec = NewItem {
            name: name.to_string(),
            unit: "pcs".to_string(),
            sku: None,
            description: None,
            category_id: None,
            initial_quantity: 0,
            reorder_level: 0,
        };
        Item::create(ItemId::new(), &spec, Utc::now()).unwrap()
    }

    fn decide(item: &Item, kind: MovementKind, quantity: i64) -> LedgerEntry {
        item.decide(&RecordMovement {
            entry_id: EntryId::new(),
            item_id: item.id_typed(),
            kind,
            quantity,
            location_id: None,
            project_id: None,
            actor_id: UserId::new(),
            note: None,
            occurred_at: Utc::now(),
        })
        .unwrap()
    }

    fn location(name: &str) -> Location {
        let spec = NewLocation {
            name: name.to_string(),
            address: None,
            kind: LocationKind::Site,
        };
        Location::create(LocationId::new(), &spec, Utc::now()).unwrap()
    }

    fn project(location_id: Option<LocationId>) -> Project {
        let id = ProjectId::new();
        let spec = NewProject {
            name: "Integration project".to_string(),
            // Codes are unique across runs sharing a database.
            code: format!("IT-{id}"),
            description: None,
            status: ProjectStatus::Active,
            location_id,
        };
        Project::create(id, &spec, Utc::now()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_pools_never_oversell() {
        const N: i64 = 12;
        let (Some(first), Some(second)) = (pg_store().await, pg_store().await) else {
            return;
        };

        let item = new_item("Race item");
        let opening = decide(&item, MovementKind::Adjustment, N - 1);
        first.insert_item(&item, Some(&opening)).await.unwrap();
        let id = item.id_typed();

        // Separate processors share no in-process lock; only the row lock and
        // version check stand between them.
        let a = Arc::new(TransactionProcessor::new(first, InMemoryAuditLog::new(), 100));
        let b = Arc::new(TransactionProcessor::new(second, InMemoryAuditLog::new(), 100));

        let mut handles = Vec::new();
        for i in 0..N {
            let p = if i % 2 == 0 { Arc::clone(&a) } else { Arc::clone(&b) };
            handles.push(tokio::spawn(async move {
                let req = MovementRequest {
                    item_id: id,
                    kind: MovementKind::Out,
                    quantity: 1,
                    location_id: None,
                    project_id: None,
                    note: None,
                };
                p.apply_movement(&staff(), req).await
            }));
        }

        let mut ok = 0;
        let mut insufficient = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) if matches!(e.as_domain(), Some(DomainError::InsufficientStock { .. })) => {
                    insufficient += 1
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, N - 1);
        assert_eq!(insufficient, 1);

        let stored = a.store().get_item(id).await.unwrap().unwrap();
        assert_eq!(stored.current_quantity(), 0);
        let ledger = a.store().ledger_entries(id).await.unwrap();
        let seqs: Vec<u64> = ledger.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, (1..=N as u64).collect::<Vec<_>>());
        assert_eq!(stored.version(), N as u64);
    }

    #[tokio::test]
    async fn stale_commit_is_rejected() {
        let Some(store) = pg_store().await else {
            return;
        };
        let item = new_item("Stale item");
        store.insert_item(&item, None).await.unwrap();

        let first = decide(&item, MovementKind::In, 5);
        let stale = decide(&item, MovementKind::In, 7);
        store
            .commit_movement(&first, ExpectedVersion::Exact(0))
            .await
            .unwrap();

        for expected in [ExpectedVersion::Exact(0), ExpectedVersion::Any] {
            let err = store.commit_movement(&stale, expected).await.unwrap_err();
            assert!(matches!(err, StoreError::VersionConflict(_)), "{expected:?}");
        }

        let stored = store.get_item(item.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.current_quantity(), 5);
        let ledger = store.ledger_entries(item.id_typed()).await.unwrap();
        assert_eq!(ledger.iter().map(|e| e.id).collect::<Vec<_>>(), vec![first.id]);
    }

    #[tokio::test]
    async fn item_and_opening_entry_are_written_together() {
        let Some(store) = pg_store().await else {
            return;
        };

        let item = new_item("Opening item");
        let opening = decide(&item, MovementKind::Adjustment, 9);
        let stored = store.insert_item(&item, Some(&opening)).await.unwrap();
        assert_eq!((stored.current_quantity(), stored.version()), (9, 1));
        let reloaded = store.get_item(item.id_typed()).await.unwrap().unwrap();
        assert_eq!(reloaded.current_quantity(), 9);
        let ledger = store.ledger_entries(item.id_typed()).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!((ledger[0].id, ledger[0].resulting_quantity), (opening.id, 9));

        // The ledger row fails its foreign key after the item row went in;
        // the whole insert rolls back.
        let orphan = new_item("Orphan item");
        let mut bad = decide(&orphan, MovementKind::Adjustment, 4);
        bad.location_id = Some(LocationId::new());
        let err = store.insert_item(&orphan, Some(&bad)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.get_item(orphan.id_typed()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn catalog_deletes_follow_reference_rules() {
        let Some(store) = pg_store().await else {
            return;
        };

        let category = Category::create(
            CategoryId::new(),
            &NewCategory { name: "Integration category".to_string(), description: None },
            Utc::now(),
        )
        .unwrap();
        store.insert_category(&category).await.unwrap();
        let mut item = new_item("Categorized item");
        item.update_details(&ItemDetails {
            name: "Categorized item".to_string(),
            unit: "pcs".to_string(),
            sku: None,
            description: None,
            category_id: Some(category.id),
        })
        .unwrap();
        store.insert_item(&item, None).await.unwrap();

        store.delete_category(category.id).await.unwrap();
        let reloaded = store.get_item(item.id_typed()).await.unwrap().unwrap();
        assert_eq!(reloaded.category_id(), None);
        assert!(matches!(
            store.delete_category(category.id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));

        let used_site = location("Used site");
        let home_site = location("Home site");
        store.insert_location(&used_site).await.unwrap();
        store.insert_location(&home_site).await.unwrap();
        let used = project(None);
        let homed = project(Some(home_site.id));
        store.insert_project(&used).await.unwrap();
        store.insert_project(&homed).await.unwrap();

        let mut entry = decide(&item, MovementKind::In, 6);
        entry.location_id = Some(used_site.id);
        entry.project_id = Some(used.id);
        store
            .commit_movement(&entry, ExpectedVersion::Exact(0))
            .await
            .unwrap();

        assert!(matches!(
            store.delete_location(used_site.id).await.unwrap_err(),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            store.delete_project(used.id).await.unwrap_err(),
            StoreError::Conflict(_)
        ));

        store.delete_location(home_site.id).await.unwrap();
        let homed = store.get_project(homed.id).await.unwrap().unwrap();
        assert_eq!(homed.location_id, None);
        store.delete_project(homed.id).await.unwrap();

        let totals = store.project_totals().await.unwrap();
        let used_totals = totals.iter().find(|t| t.project_id == used.id).unwrap();
        assert_eq!((used_totals.total_in, used_totals.total_out), (6, 0));
    }
}
