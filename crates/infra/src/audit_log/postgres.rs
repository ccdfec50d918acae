use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use sitestock_audit::{AuditError, AuditFilter, AuditRecord};
use sitestock_core::{AuditId, Page, PageWindow, UserId};

use super::AuditLog;
use crate::store::postgres::map_sqlx_error;
use crate::store::StoreError;

/// `audit_logs` table writer/reader.
#[derive(Debug, Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditLog for PgAuditLog {
    #[instrument(
        skip(self, record),
        fields(audit_id = %record.id, target_type = %record.target_type),
        err
    )]
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, actor_id, action, target_type, target_id, recorded_at, snapshot)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.actor_id.as_uuid())
        .bind(record.action.as_str())
        .bind(record.target_type.as_str())
        .bind(&record.target_id)
        .bind(record.recorded_at)
        .bind(&record.snapshot)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::WriteFailed(map_sqlx_error("append_audit", e).to_string()))?;
        Ok(())
    }

    #[instrument(skip(self, filter), fields(offset = window.offset, limit = window.limit), err)]
    async fn query(
        &self,
        filter: &AuditFilter,
        window: PageWindow,
    ) -> Result<Page<AuditRecord>, StoreError> {
        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR action = $1)
                AND ($2::text IS NULL OR target_type = $2)
                AND ($3::text IS NULL OR target_id = $3)
                AND ($4::uuid IS NULL OR actor_id = $4)
                AND ($5::timestamptz IS NULL OR recorded_at >= $5)
                AND ($6::timestamptz IS NULL OR recorded_at < $6)
        "#;

        let action = filter.action.map(|a| a.as_str());
        let target_type = filter.target_type.map(|t| t.as_str());
        let target_id = filter.target_id.as_deref();
        let actor_id = filter.actor_id.map(|u| *u.as_uuid());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_logs {WHERE}"))
            .bind(action)
            .bind(target_type)
            .bind(target_id)
            .bind(actor_id)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_audit", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT id, actor_id, action, target_type, target_id, recorded_at, snapshot
            FROM audit_logs
            {WHERE}
            ORDER BY recorded_at DESC, id DESC
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(action)
        .bind(target_type)
        .bind(target_id)
        .bind(actor_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(i64::from(window.limit))
        .bind(i64::from(window.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_audit", e))?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(records, total.max(0) as u64, window))
    }
}

fn record_from_row(row: &PgRow) -> Result<AuditRecord, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("failed to read audit row: {e}"));
    let action: String = row.try_get("action").map_err(read)?;
    let target_type: String = row.try_get("target_type").map_err(read)?;

    Ok(AuditRecord {
        id: AuditId::from_uuid(row.try_get("id").map_err(read)?),
        actor_id: UserId::from_uuid(row.try_get("actor_id").map_err(read)?),
        action: action
            .parse()
            .map_err(|e| StoreError::Backend(format!("bad audit action: {e}")))?,
        target_type: target_type
            .parse()
            .map_err(|e| StoreError::Backend(format!("bad audit target type: {e}")))?,
        target_id: row.try_get("target_id").map_err(read)?,
        recorded_at: row.try_get("recorded_at").map_err(read)?,
        snapshot: row.try_get("snapshot").map_err(read)?,
    })
}
