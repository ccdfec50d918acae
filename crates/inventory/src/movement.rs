//! Stock movements and the append-only ledger they produce.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitestock_core::{DomainError, EntryId, ItemId, LocationId, ProjectId, UserId};

/// Kind of stock movement.
///
/// `In` and `Out` carry a positive delta quantity. `Adjustment` carries the
/// absolute target quantity; its ledger delta is derived from the prior value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    In,
    Out,
    Adjustment,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
            MovementKind::Adjustment => "adjustment",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementKind::In),
            "out" => Ok(MovementKind::Out),
            "adjustment" => Ok(MovementKind::Adjustment),
            other => Err(DomainError::validation(format!(
                "unknown movement kind '{other}' (expected in, out or adjustment)"
            ))),
        }
    }
}

/// Command: record one movement against an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub entry_id: EntryId,
    pub item_id: ItemId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub project_id: Option<ProjectId>,
    pub actor_id: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Fact: one immutable ledger line.
///
/// `sequence` is 1-based per item and equals the item version after the entry
/// was applied. Corrections are new entries, never edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub item_id: ItemId,
    pub sequence: u64,
    pub kind: MovementKind,
    /// Raw input: delta for in/out, target for adjustment.
    pub quantity: i64,
    /// Signed change applied to on-hand stock.
    pub delta: i64,
    pub resulting_quantity: i64,
    pub location_id: Option<LocationId>,
    pub project_id: Option<ProjectId>,
    pub actor_id: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn previous_quantity(&self) -> i64 {
        self.resulting_quantity - self.delta
    }
}

/// Sum of signed deltas; the quantity the ledger says the item should hold.
pub fn replay_quantity<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> i64 {
    entries.into_iter().map(|e| e.delta).sum()
}

/// Outcome of re-deriving an item's quantity from its full ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub item_id: ItemId,
    pub stored_quantity: i64,
    pub ledger_quantity: i64,
    pub entry_count: u64,
    pub version: u64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.stored_quantity == self.ledger_quantity && self.entry_count == self.version
    }

    pub fn drift(&self) -> i64 {
        self.stored_quantity - self.ledger_quantity
    }
}

/// Cross-item ledger query (the transactions screen).
///
/// `from` is inclusive, `to` is exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub item_id: Option<ItemId>,
    pub kind: Option<MovementKind>,
    pub location_id: Option<LocationId>,
    pub project_id: Option<ProjectId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl LedgerFilter {
    pub fn for_item(item_id: ItemId) -> Self {
        Self {
            item_id: Some(item_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.item_id.is_none_or(|id| id == entry.item_id)
            && self.kind.is_none_or(|k| k == entry.kind)
            && self.location_id.is_none_or(|l| Some(l) == entry.location_id)
            && self.project_id.is_none_or(|p| Some(p) == entry.project_id)
            && self.from.is_none_or(|from| entry.occurred_at >= from)
            && self.to.is_none_or(|to| entry.occurred_at < to)
    }
}

/// Most-recent-first ordering used by every ledger listing.
pub fn newest_first(a: &LedgerEntry, b: &LedgerEntry) -> core::cmp::Ordering {
    b.occurred_at
        .cmp(&a.occurred_at)
        .then_with(|| b.sequence.cmp(&a.sequence))
        .then_with(|| b.id.cmp(&a.id))
}
