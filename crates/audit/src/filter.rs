use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitestock_core::UserId;

use crate::{ActionKind, AuditRecord, TargetType};

/// Audit log query. Every field narrows the result; `to` is exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub action: Option<ActionKind>,
    pub target_type: Option<TargetType>,
    pub target_id: Option<String>,
    pub actor_id: Option<UserId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.action.is_none_or(|a| a == record.action)
            && self.target_type.is_none_or(|t| t == record.target_type)
            && self
                .target_id
                .as_deref()
                .is_none_or(|id| id == record.target_id)
            && self.actor_id.is_none_or(|u| u == record.actor_id)
            && self.from.is_none_or(|from| record.recorded_at >= from)
            && self.to.is_none_or(|to| record.recorded_at < to)
    }
}

/// Most-recent-first ordering for audit listings.
pub fn newest_first(a: &AuditRecord, b: &AuditRecord) -> core::cmp::Ordering {
    b.recorded_at
        .cmp(&a.recorded_at)
        .then_with(|| b.id.cmp(&a.id))
}
