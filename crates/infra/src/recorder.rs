//! Best-effort audit recording.
//!
//! An audit write happens after the primary mutation has committed. If it
//! fails, the mutation still stands: the failure is logged and counted so it
//! shows up in monitoring instead of in the caller's result.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value as JsonValue;

use sitestock_audit::{ActionKind, AuditRecord, TargetType};
use sitestock_core::{AuditId, UserId};

use crate::audit_log::AuditLog;

pub struct AuditRecorder<A> {
    log: A,
    failures: AtomicU64,
}

impl<A: AuditLog> AuditRecorder<A> {
    pub fn new(log: A) -> Self {
        Self {
            log,
            failures: AtomicU64::new(0),
        }
    }

    pub fn log(&self) -> &A {
        &self.log
    }

    /// Audit writes that failed since startup.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Append one record. Returns its id, or `None` if the write failed.
    pub async fn record(
        &self,
        actor_id: UserId,
        action: ActionKind,
        target_type: TargetType,
        target_id: impl core::fmt::Display,
        snapshot: JsonValue,
    ) -> Option<AuditId> {
        let record = AuditRecord::new(actor_id, action, target_type, target_id, snapshot);
        match self.log.append(&record).await {
            Ok(()) => Some(record.id),
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    audit_id = %record.id,
                    actor_id = %record.actor_id,
                    action = %record.action,
                    target_type = %record.target_type,
                    target_id = %record.target_id,
                    error = %err,
                    "audit write failed; primary change was kept"
                );
                None
            }
        }
    }
}

/// Serialize an entity for an audit snapshot.
///
/// A value that cannot be serialized is recorded as `null` rather than
/// dropping the audit record.
pub fn snapshot_of<T: Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "audit snapshot could not be serialized");
        JsonValue::Null
    })
}

impl<A> core::fmt::Debug for AuditRecorder<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("failures", &self.failures.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
