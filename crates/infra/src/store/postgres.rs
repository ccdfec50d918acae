//! Postgres-backed inventory store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `VersionConflict` on the ledger, `Conflict` elsewhere | Concurrent commit of the same sequence, duplicate id or project code |
//! | Database (foreign key violation) | `23503` | `Conflict` | Ledger row naming a location or project deleted meanwhile |
//! | Database (check violation) | `23514` | `Conflict` | Negative quantity reached the table |
//! | Anything else | n/a | `Backend` | Network, pool, decode failures |
//!
//! ## Atomicity
//!
//! `commit_movement` locks the item row (`SELECT ... FOR UPDATE`), checks the
//! version, updates the cached quantity and inserts the ledger row in one
//! transaction. The `UNIQUE (item_id, sequence)` constraint backs the lock up.
//! `insert_item` writes the item row and its opening ledger row in one
//! transaction as well.
//!
//! Catalog deletes rely on the schema's `ON DELETE SET NULL` for items and
//! project home locations; ledger references are checked under a row lock
//! before deleting.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Uuid;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use sitestock_core::{
    Aggregate, AggregateRoot, CategoryId, EntryId, ExpectedVersion, ItemId, LocationId, Page,
    PageWindow, ProjectId, UserId,
};
use sitestock_inventory::{
    Category, Item, ItemDetails, ItemFilter, ItemSnapshot, LedgerEntry, LedgerFilter, Location,
    Project, ProjectTotals,
};

use super::r#trait::{check_opening, CatalogStore, InventoryStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_inventory.sql");

const ITEM_COLUMNS: &str = "id, name, unit, sku, description, category_id, current_quantity, \
                            reorder_level, version, created_at";

const ENTRY_COLUMNS: &str = "id, item_id, sequence, kind, quantity, delta, resulting_quantity, \
                             location_id, project_id, actor_id, note, occurred_at";

/// Open a pool against `database_url`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create tables and indexes if they are missing. Idempotent.
#[instrument(skip(pool), err)]
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'_, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

async fn lock_item(
    tx: &mut Transaction<'_, Postgres>,
    id: ItemId,
    operation: &str,
) -> Result<Item, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(operation, e))?
    .ok_or_else(|| StoreError::not_found("item", id))?;

    item_from_row(&row)
}

async fn insert_item_row(
    conn: &mut PgConnection,
    item: &Item,
    operation: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO items
            (id, name, unit, sku, description, category_id,
             current_quantity, reorder_level, version, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(item.id_typed().as_uuid())
    .bind(item.name())
    .bind(item.unit())
    .bind(item.sku())
    .bind(item.description())
    .bind(item.category_id().map(|c| *c.as_uuid()))
    .bind(item.current_quantity())
    .bind(item.reorder_level())
    .bind(item.version() as i64)
    .bind(item.created_at())
    .execute(conn)
    .await
    .map_err(|e| map_sqlx_error(operation, e))?;
    Ok(())
}

async fn insert_entry_row(
    conn: &mut PgConnection,
    entry: &LedgerEntry,
    operation: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO inventory_transactions
            (id, item_id, sequence, kind, quantity, delta, resulting_quantity,
             location_id, project_id, actor_id, note, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(entry.item_id.as_uuid())
    .bind(entry.sequence as i64)
    .bind(entry.kind.as_str())
    .bind(entry.quantity)
    .bind(entry.delta)
    .bind(entry.resulting_quantity)
    .bind(entry.location_id.map(|l| *l.as_uuid()))
    .bind(entry.project_id.map(|p| *p.as_uuid()))
    .bind(entry.actor_id.as_uuid())
    .bind(entry.note.as_deref())
    .bind(entry.occurred_at)
    .execute(conn)
    .await
    .map_err(|e| map_sqlx_error(operation, e))?;
    Ok(())
}

/// Lock a catalog row so ledger inserts naming it wait for the delete.
async fn lock_catalog_row(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    entity: &'static str,
    id: Uuid,
    operation: &str,
) -> Result<(), StoreError> {
    let found = sqlx::query(&format!("SELECT id FROM {table} WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::not_found(entity, id)),
    }
}

/// `column` is `location_id` or `project_id`.
async fn ledger_references(
    tx: &mut Transaction<'_, Postgres>,
    column: &'static str,
    id: Uuid,
    operation: &str,
) -> Result<bool, StoreError> {
    sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM inventory_transactions WHERE {column} = $1)"
    ))
    .bind(id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(operation, e))
}

fn affected_one(rows: u64, entity: &'static str, id: Uuid) -> Result<(), StoreError> {
    if rows == 0 {
        return Err(StoreError::not_found(entity, id));
    }
    Ok(())
}

/// Escape `%`, `_` and `\` so user text matches literally inside `ILIKE`.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait::async_trait]
impl InventoryStore for PgStore {
    #[instrument(
        skip(self, item, opening),
        fields(item_id = %item.id_typed(), with_opening = opening.is_some()),
        err
    )]
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
        if let Some(entry) = opening {
            check_opening(item, entry)?;
            stored.apply(entry);
        }

        let mut tx = self.begin("insert_item").await?;
        insert_item_row(&mut tx, &stored, "insert_item").await?;
        if let Some(entry) = opening {
            insert_entry_row(&mut tx, entry, "insert_item").await?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(stored)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self, filter), err)]
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE ($1::uuid IS NULL OR category_id = $1)
                AND ($2::text IS NULL
                     OR name ILIKE $2 OR sku ILIKE $2 OR description ILIKE $2)
                AND (NOT $3 OR current_quantity <= reorder_level)
            ORDER BY name ASC, id ASC
            "#
        ))
        .bind(filter.category_id.map(|c| *c.as_uuid()))
        .bind(search)
        .bind(filter.low_stock_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self, details), fields(item_id = %id), err)]
    async fn update_details(&self, id: ItemId, details: &ItemDetails) -> Result<Item, StoreError> {
        let mut tx = self.begin("update_details").await?;
        let mut item = lock_item(&mut tx, id, "update_details").await?;
        item.update_details(details)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE items
            SET name = $2, unit = $3, sku = $4, description = $5, category_id = $6
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(item.name())
        .bind(item.unit())
        .bind(item.sku())
        .bind(item.description())
        .bind(item.category_id().map(|c| *c.as_uuid()))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_details", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_details", e))?;
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn set_reorder_level(&self, id: ItemId, level: i64) -> Result<Item, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE items SET reorder_level = $2 WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(level)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_reorder_level", e))?
        .ok_or_else(|| StoreError::not_found("item", id))?;
        item_from_row(&row)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        let mut tx = self.begin("delete_item").await?;
        lock_item(&mut tx, id, "delete_item").await?;

        let has_history: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM inventory_transactions WHERE item_id = $1)",
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_item", e))?;
        if has_history {
            return Err(StoreError::Conflict(format!(
                "item {id} has ledger entries and cannot be deleted"
            )));
        }

        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, entry),
        fields(item_id = %entry.item_id, entry_id = %entry.id, sequence = entry.sequence),
        err
    )]
    async fn commit_movement(
        &self,
        entry: &LedgerEntry,
        expected: ExpectedVersion,
    ) -> Result<Item, StoreError> {
        let mut tx = self.begin("commit_movement").await?;
        let current = lock_item(&mut tx, entry.item_id, "commit_movement").await?;

        if !expected.matches(current.version()) {
            return Err(StoreError::VersionConflict(format!(
                "expected {expected:?}, found {}",
                current.version()
            )));
        }
        if entry.sequence != current.version() + 1
            || entry.previous_quantity() != current.current_quantity()
        {
            return Err(StoreError::VersionConflict(format!(
                "entry {} was decided against stale state (sequence {}, item version {})",
                entry.id,
                entry.sequence,
                current.version()
            )));
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE items
            SET current_quantity = $2, version = $3
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(entry.item_id.as_uuid())
        .bind(entry.resulting_quantity)
        .bind(entry.sequence as i64)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("commit_movement", e))?;
        let committed = item_from_row(&row)?;

        insert_entry_row(&mut tx, entry, "commit_movement")
            .await
            .map_err(|e| match e {
                // A duplicate (item_id, sequence) means another writer got there first.
                StoreError::Conflict(msg) => StoreError::VersionConflict(msg),
                other => other,
            })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_movement", e))?;
        Ok(committed)
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn ledger_entries(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM inventory_transactions WHERE item_id = $1 ORDER BY sequence ASC"
        ))
        .bind(item_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ledger_entries", e))?;
        rows.iter().map(entry_from_row).collect()
    }

    #[instrument(skip(self, filter), fields(offset = window.offset, limit = window.limit), err)]
    async fn query_ledger(
        &self,
        filter: &LedgerFilter,
        window: PageWindow,
    ) -> Result<Page<LedgerEntry>, StoreError> {
        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR item_id = $1)
                AND ($2::text IS NULL OR kind = $2)
                AND ($3::uuid IS NULL OR location_id = $3)
                AND ($4::uuid IS NULL OR project_id = $4)
                AND ($5::timestamptz IS NULL OR occurred_at >= $5)
                AND ($6::timestamptz IS NULL OR occurred_at < $6)
        "#;

        let item_id = filter.item_id.map(|i| *i.as_uuid());
        let kind = filter.kind.map(|k| k.as_str());
        let location_id = filter.location_id.map(|l| *l.as_uuid());
        let project_id = filter.project_id.map(|p| *p.as_uuid());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM inventory_transactions {WHERE}"
        ))
        .bind(item_id)
        .bind(kind)
        .bind(location_id)
        .bind(project_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_ledger", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM inventory_transactions
            {WHERE}
            ORDER BY occurred_at DESC, sequence DESC, id DESC
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(item_id)
        .bind(kind)
        .bind(location_id)
        .bind(project_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(i64::from(window.limit))
        .bind(i64::from(window.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_ledger", e))?;

        let entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(entries, total.max(0) as u64, window))
    }

    #[instrument(skip(self), err)]
    async fn project_totals(&self) -> Result<Vec<ProjectTotals>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT project_id,
                   COALESCE(SUM(quantity) FILTER (WHERE kind = 'in'), 0)::BIGINT AS total_in,
                   COALESCE(SUM(quantity) FILTER (WHERE kind = 'out'), 0)::BIGINT AS total_out
            FROM inventory_transactions
            WHERE project_id IS NOT NULL
            GROUP BY project_id
            ORDER BY project_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("project_totals", e))?;

        rows.iter()
            .map(|row| {
                Ok(ProjectTotals {
                    project_id: ProjectId::from_uuid(decode(row, "project_id")?),
                    total_in: decode(row, "total_in")?,
                    total_out: decode(row, "total_out")?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgStore {
    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO categories (id, name, description, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(category.description.as_deref())
        .bind(category.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT id, name, description, created_at FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter().map(category_from_row).collect()
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE categories SET name = $2, description = $3 WHERE id = $1")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(category.description.as_deref())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_category", e))?;
        affected_one(result.rows_affected(), "category", *category.id.as_uuid())
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError> {
        // items.category_id is ON DELETE SET NULL.
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        affected_one(result.rows_affected(), "category", *id.as_uuid())
    }

    #[instrument(skip(self, location), fields(location_id = %location.id), err)]
    async fn insert_location(&self, location: &Location) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO locations (id, name, address, kind, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(location.id.as_uuid())
        .bind(&location.name)
        .bind(location.address.as_deref())
        .bind(location.kind.as_str())
        .bind(location.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_location", e))?;
        Ok(())
    }

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        let row = sqlx::query("SELECT id, name, address, kind, created_at FROM locations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_location", e))?;
        row.as_ref().map(location_from_row).transpose()
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        let rows = sqlx::query("SELECT id, name, address, kind, created_at FROM locations ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_locations", e))?;
        rows.iter().map(location_from_row).collect()
    }

    #[instrument(skip(self, location), fields(location_id = %location.id), err)]
    async fn update_location(&self, location: &Location) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE locations SET name = $2, address = $3, kind = $4 WHERE id = $1")
                .bind(location.id.as_uuid())
                .bind(&location.name)
                .bind(location.address.as_deref())
                .bind(location.kind.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("update_location", e))?;
        affected_one(result.rows_affected(), "location", *location.id.as_uuid())
    }

    #[instrument(skip(self), fields(location_id = %id), err)]
    async fn delete_location(&self, id: LocationId) -> Result<(), StoreError> {
        let mut tx = self.begin("delete_location").await?;
        lock_catalog_row(&mut tx, "locations", "location", *id.as_uuid(), "delete_location").await?;
        if ledger_references(&mut tx, "location_id", *id.as_uuid(), "delete_location").await? {
            return Err(StoreError::Conflict(format!(
                "location {id} is referenced by inventory transactions"
            )));
        }
        // projects.location_id is ON DELETE SET NULL.
        sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_location", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_location", e))?;
        Ok(())
    }

    #[instrument(skip(self, project), fields(project_id = %project.id), err)]
    async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, code, description, status, location_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(project.id.as_uuid())
        .bind(&project.name)
        .bind(&project.code)
        .bind(project.description.as_deref())
        .bind(project.status.as_str())
        .bind(project.location_id.map(|l| *l.as_uuid()))
        .bind(project.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_project", e))?;
        Ok(())
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, code, description, status, location_id, created_at FROM projects WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_project", e))?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, code, description, status, location_id, created_at FROM projects ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_projects", e))?;
        rows.iter().map(project_from_row).collect()
    }

    #[instrument(skip(self, project), fields(project_id = %project.id), err)]
    async fn update_project(&self, project: &Project) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET name = $2, code = $3, description = $4, status = $5, location_id = $6
            WHERE id = $1
            "#,
        )
        .bind(project.id.as_uuid())
        .bind(&project.name)
        .bind(&project.code)
        .bind(project.description.as_deref())
        .bind(project.status.as_str())
        .bind(project.location_id.map(|l| *l.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_project", e))?;
        affected_one(result.rows_affected(), "project", *project.id.as_uuid())
    }

    #[instrument(skip(self), fields(project_id = %id), err)]
    async fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let mut tx = self.begin("delete_project").await?;
        lock_catalog_row(&mut tx, "projects", "project", *id.as_uuid(), "delete_project").await?;
        if ledger_references(&mut tx, "project_id", *id.as_uuid(), "delete_project").await? {
            return Err(StoreError::Conflict(format!(
                "project {id} is referenced by inventory transactions"
            )));
        }
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_project", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_project", e))?;
        Ok(())
    }
}

fn decode<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read column {column}: {e}")))
}

fn non_negative(value: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Backend(format!("column {column} holds negative value {value}")))
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let version: i64 = decode(row, "version")?;
    Ok(Item::rehydrate(ItemSnapshot {
        id: ItemId::from_uuid(decode(row, "id")?),
        name: decode(row, "name")?,
        unit: decode(row, "unit")?,
        sku: decode(row, "sku")?,
        description: decode(row, "description")?,
        category_id: decode::<Option<Uuid>>(row, "category_id")?.map(CategoryId::from_uuid),
        current_quantity: decode(row, "current_quantity")?,
        reorder_level: decode(row, "reorder_level")?,
        version: non_negative(version, "version")?,
        created_at: decode(row, "created_at")?,
    }))
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let sequence: i64 = decode(row, "sequence")?;
    let kind: String = decode(row, "kind")?;
    Ok(LedgerEntry {
        id: EntryId::from_uuid(decode(row, "id")?),
        item_id: ItemId::from_uuid(decode(row, "item_id")?),
        sequence: non_negative(sequence, "sequence")?,
        kind: kind
            .parse()
            .map_err(|e| StoreError::Backend(format!("bad movement kind in ledger: {e}")))?,
        quantity: decode(row, "quantity")?,
        delta: decode(row, "delta")?,
        resulting_quantity: decode(row, "resulting_quantity")?,
        location_id: decode::<Option<Uuid>>(row, "location_id")?.map(LocationId::from_uuid),
        project_id: decode::<Option<Uuid>>(row, "project_id")?.map(ProjectId::from_uuid),
        actor_id: UserId::from_uuid(decode(row, "actor_id")?),
        note: decode(row, "note")?,
        occurred_at: decode::<DateTime<Utc>>(row, "occurred_at")?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category, StoreError> {
    Ok(Category {
        id: CategoryId::from_uuid(decode(row, "id")?),
        name: decode(row, "name")?,
        description: decode(row, "description")?,
        created_at: decode(row, "created_at")?,
    })
}

fn location_from_row(row: &PgRow) -> Result<Location, StoreError> {
    let kind: String = decode(row, "kind")?;
    Ok(Location {
        id: LocationId::from_uuid(decode(row, "id")?),
        name: decode(row, "name")?,
        address: decode(row, "address")?,
        kind: kind
            .parse()
            .map_err(|e| StoreError::Backend(format!("bad location kind: {e}")))?,
        created_at: decode(row, "created_at")?,
    })
}

fn project_from_row(row: &PgRow) -> Result<Project, StoreError> {
    let status: String = decode(row, "status")?;
    Ok(Project {
        id: ProjectId::from_uuid(decode(row, "id")?),
        name: decode(row, "name")?,
        code: decode(row, "code")?,
        description: decode(row, "description")?,
        status: status
            .parse()
            .map_err(|e| StoreError::Backend(format!("bad project status: {e}")))?,
        location_id: decode::<Option<Uuid>>(row, "location_id")?.map(LocationId::from_uuid),
        created_at: decode(row, "created_at")?,
    })
}

/// Map SQLx errors to `StoreError`.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Backend(format!("unexpected row not found in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
