//! Transaction processor: the only path that changes on-hand stock.
//!
//! Flow for one movement:
//! 1. authorize (`inventory.write`)
//! 2. resolve optional location/project references
//! 3. take the item's in-process lock
//! 4. read item, `decide` the ledger entry, commit with `ExpectedVersion::Exact`
//! 5. on a version conflict re-read and retry, up to `max_retries`
//! 6. release the lock, then audit (best effort)

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::instrument;

use sitestock_audit::{ActionKind, TargetType};
use sitestock_auth::{authorize, Permission, RequestContext};
use sitestock_core::{
    Aggregate, AggregateRoot, DomainError, EntryId, ExpectedVersion, ItemId, LocationId,
    ProjectId,
};
use sitestock_inventory::{LedgerEntry, MovementKind, RecordMovement};

use crate::audit_log::AuditLog;
use crate::error::{LedgerResult, LedgerServiceError};
use crate::item_locks::ItemLocks;
use crate::recorder::{snapshot_of, AuditRecorder};
use crate::store::{Store, StoreError};

/// A caller's request to move stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub item_id: ItemId,
    pub kind: MovementKind,
    /// Amount for `in`/`out`; absolute target for `adjustment`.
    pub quantity: i64,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub note: Option<String>,
}

pub struct TransactionProcessor<S, A> {
    store: S,
    recorder: AuditRecorder<A>,
    locks: ItemLocks,
    max_retries: u32,
}

impl<S, A> TransactionProcessor<S, A>
where
    S: Store,
    A: AuditLog,
{
    pub fn new(store: S, audit_log: A, max_retries: u32) -> Self {
        Self {
            store,
            recorder: AuditRecorder::new(audit_log),
            locks: ItemLocks::new(),
            max_retries,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn recorder(&self) -> &AuditRecorder<A> {
        &self.recorder
    }

    pub fn locks(&self) -> &ItemLocks {
        &self.locks
    }

    /// Validate and commit one movement, returning the ledger entry it produced.
    #[instrument(
        skip(self, ctx, req),
        fields(
            item_id = %req.item_id,
            kind = %req.kind,
            quantity = req.quantity,
            actor_id = %ctx.user_id()
        ),
        err
    )]
    pub async fn apply_movement(
        &self,
        ctx: &RequestContext,
        req: MovementRequest,
    ) -> LedgerResult<LedgerEntry> {
        authorize(ctx, Permission::InventoryWrite)?;
        self.check_references(req.location_id, req.project_id).await?;

        let entry = {
            let _guard = self.locks.acquire(req.item_id).await;
            self.commit_with_retry(ctx, &req).await?
        };

        tracing::info!(
            entry_id = %entry.id,
            sequence = entry.sequence,
            delta = entry.delta,
            resulting_quantity = entry.resulting_quantity,
            "movement committed"
        );

        self.recorder
            .record(
                ctx.user_id(),
                ActionKind::Create,
                TargetType::InventoryTransactions,
                entry.id,
                movement_snapshot(&entry),
            )
            .await;

        Ok(entry)
    }

    async fn check_references(
        &self,
        location_id: Option<LocationId>,
        project_id: Option<ProjectId>,
    ) -> LedgerResult<()> {
        if let Some(id) = location_id {
            if self.store.get_location(id).await?.is_none() {
                return Err(DomainError::reference_not_found("location", id).into());
            }
        }
        if let Some(id) = project_id {
            if self.store.get_project(id).await?.is_none() {
                return Err(DomainError::reference_not_found("project", id).into());
            }
        }
        Ok(())
    }

    async fn commit_with_retry(
        &self,
        ctx: &RequestContext,
        req: &MovementRequest,
    ) -> LedgerResult<LedgerEntry> {
        let entry_id = EntryId::new();
        let mut attempt = 0u32;

        loop {
            let item = self
                .store
                .get_item(req.item_id)
                .await?
                .ok_or_else(|| DomainError::not_found("item", req.item_id))?;

            let entry = item.decide(&RecordMovement {
                entry_id,
                item_id: req.item_id,
                kind: req.kind,
                quantity: req.quantity,
                location_id: req.location_id,
                project_id: req.project_id,
                actor_id: ctx.user_id(),
                note: req.note.clone(),
                occurred_at: Utc::now(),
            })?;

            match self
                .store
                .commit_movement(&entry, ExpectedVersion::Exact(item.version()))
                .await
            {
                Ok(_) => return Ok(entry),
                Err(StoreError::VersionConflict(reason)) => {
                    if attempt >= self.max_retries {
                        return Err(LedgerServiceError::Domain(
                            DomainError::concurrent_modification(format!(
                                "item {} changed during {} attempts: {reason}",
                                req.item_id,
                                attempt + 1
                            )),
                        ));
                    }
                    attempt += 1;
                    tracing::warn!(attempt, %reason, "version conflict; retrying movement");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }
}

/// Audit payload for a movement: the entry plus the quantity it started from.
pub(crate) fn movement_snapshot(entry: &LedgerEntry) -> JsonValue {
    let mut snapshot = snapshot_of(entry);
    if let JsonValue::Object(map) = &mut snapshot {
        map.insert(
            "previous_quantity".to_string(),
            JsonValue::from(entry.previous_quantity()),
        );
    }
    snapshot
}

impl<S, A> core::fmt::Debug for TransactionProcessor<S, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransactionProcessor")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sitestock_core::UserId;
    use sitestock_inventory::{Item, NewItem};

    use crate::audit_log::InMemoryAuditLog;
    use crate::store::{InMemoryStore, InventoryStore};
    use crate::test_support::{ConflictingStore, FailingAuditLog};

    fn staff() -> RequestContext {
        RequestContext::new(sitestock_auth::Actor::staff(UserId::new()))
    }

    async fn seed<S: InventoryStore>(store: &S, reorder_level: i64) -> ItemId {
        let spec = NewItem {
            name: "Rebar 12mm".to_string(),
            unit: "bar".to_string(),
            sku: Some("RB-12".to_string()),
            description: None,
            category_id: None,
            initial_quantity: 0,
            reorder_level,
        };
        let item = Item::create(ItemId::new(), &spec, Utc::now()).unwrap();
        store.insert_item(&item, None).await.unwrap();
        item.id_typed()
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

    #[tokio::test]
    async fn audit_record_per_movement_holds_resulting_quantity() {
        let p = TransactionProcessor::new(InMemoryStore::new(), InMemoryAuditLog::new(), 3);
        let id = seed(p.store(), 0).await;
        let ctx = staff();

        let e1 = p.apply_movement(&ctx, movement(id, MovementKind::In, 8)).await.unwrap();
        let e2 = p.apply_movement(&ctx, movement(id, MovementKind::Out, 3)).await.unwrap();

        let records = p.recorder().log().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].target_id, e1.id.to_string());
        assert_eq!(records[1].target_type, TargetType::InventoryTransactions);
        assert_eq!(records[1].action, ActionKind::Create);
        assert_eq!(records[1].snapshot["resulting_quantity"], 5);
        assert_eq!(records[1].snapshot["previous_quantity"], 8);
        assert_eq!(e2.delta, -3);
    }

    #[tokio::test]
    async fn audit_failure_does_not_fail_movement() {
        let p = TransactionProcessor::new(InMemoryStore::new(), FailingAuditLog, 3);
        let id = seed(p.store(), 0).await;

        let entry = p
            .apply_movement(&staff(), movement(id, MovementKind::In, 4))
            .await
            .unwrap();
        assert_eq!(entry.resulting_quantity, 4);
        assert_eq!(p.recorder().failure_count(), 1);

        let item = p.store().get_item(id).await.unwrap().unwrap();
        assert_eq!(item.current_quantity(), 4);
    }

    #[tokio::test]
    async fn missing_references_fail_without_mutation() {
        let p = TransactionProcessor::new(InMemoryStore::new(), InMemoryAuditLog::new(), 3);
        let id = seed(p.store(), 0).await;

        let mut req = movement(id, MovementKind::In, 4);
        req.location_id = Some(LocationId::new());
        let err = p.apply_movement(&staff(), req).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::ReferenceNotFound { entity: "location", .. })
        ));

        let mut req = movement(id, MovementKind::In, 4);
        req.project_id = Some(ProjectId::new());
        let err = p.apply_movement(&staff(), req).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::ReferenceNotFound { entity: "project", .. })
        ));

        assert!(p.store().ledger_entries(id).await.unwrap().is_empty());
        assert!(p.recorder().log().records().is_empty());
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let p = TransactionProcessor::new(InMemoryStore::new(), InMemoryAuditLog::new(), 3);
        let err = p
            .apply_movement(&staff(), movement(ItemId::new(), MovementKind::In, 1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound { entity: "item", .. })));
    }

    #[tokio::test]
    async fn persistent_version_conflicts_exhaust_retries() {
        let store = ConflictingStore::new(InMemoryStore::new());
        let p = TransactionProcessor::new(store, InMemoryAuditLog::new(), 2);
        let id = seed(p.store(), 0).await;

        let err = p
            .apply_movement(&staff(), movement(id, MovementKind::In, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::ConcurrentModification(_))
        ));
        // One initial attempt plus two retries.
        assert_eq!(p.store().commit_attempts(), 3);
        assert!(p.recorder().log().records().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_outs_never_oversell() {
        const N: i64 = 16;
        let p = Arc::new(TransactionProcessor::new(
            InMemoryStore::new(),
            InMemoryAuditLog::new(),
            3,
        ));
        let id = seed(p.store(), 0).await;
        p.apply_movement(&staff(), movement(id, MovementKind::In, N - 1))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..N {
            let p = Arc::clone(&p);
            handles.push(tokio::spawn(async move {
                p.apply_movement(&staff(), movement(id, MovementKind::Out, 1))
                    .await
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

        let item = p.store().get_item(id).await.unwrap().unwrap();
        assert_eq!(item.current_quantity(), 0);
        let ledger = p.store().ledger_entries(id).await.unwrap();
        assert_eq!(ledger.len() as i64, N);
        let seqs: Vec<u64> = ledger.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, (1..=N as u64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn shared_store_with_version_conflicts_converges() {
        // Two processors over one store: item locks are not shared, so the
        // store's version check is what serializes them.
        let store = Arc::new(InMemoryStore::new());
        let a = Arc::new(TransactionProcessor::new(Arc::clone(&store), InMemoryAuditLog::new(), 50));
        let b = Arc::new(TransactionProcessor::new(Arc::clone(&store), InMemoryAuditLog::new(), 50));
        let id = seed(&store, 0).await;

        let mut handles = Vec::new();
        for i in 0..20 {
            let p = if i % 2 == 0 { Arc::clone(&a) } else { Arc::clone(&b) };
            handles.push(tokio::spawn(async move {
                p.apply_movement(&staff(), movement(id, MovementKind::In, 1)).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let item = store.get_item(id).await.unwrap().unwrap();
        assert_eq!(item.current_quantity(), 20);
        assert_eq!(item.version(), 20);
    }
}
