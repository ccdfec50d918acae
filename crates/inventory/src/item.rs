use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitestock_core::{Aggregate, AggregateRoot, CategoryId, DomainError, DomainResult, ItemId};

use crate::movement::{LedgerEntry, MovementKind, RecordMovement};

/// Input for creating an item.
///
/// `initial_quantity` is not written onto the item directly; callers book it
/// as an opening adjustment so the ledger explains every unit on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub initial_quantity: i64,
    #[serde(default)]
    pub reorder_level: i64,
}

impl NewItem {
    pub fn validate(&self) -> DomainResult<()> {
        require_text("name", &self.name)?;
        require_text("unit", &self.unit)?;
        if self.initial_quantity < 0 {
            return Err(DomainError::invalid_quantity(
                "initial quantity cannot be negative",
            ));
        }
        check_reorder_level(self.reorder_level)
    }
}

/// Descriptive fields that may be edited after creation. Quantity is not one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl ItemDetails {
    pub fn validate(&self) -> DomainResult<()> {
        require_text("name", &self.name)?;
        require_text("unit", &self.unit)
    }
}

/// Stored shape of an item, used by backends to rehydrate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub name: String,
    pub unit: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub current_quantity: i64,
    pub reorder_level: i64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

/// Aggregate root: Item.
///
/// On-hand quantity changes only by applying a [`LedgerEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    name: String,
    unit: String,
    sku: Option<String>,
    description: Option<String>,
    category_id: Option<CategoryId>,
    current_quantity: i64,
    reorder_level: i64,
    version: u64,
    created_at: DateTime<Utc>,
}

impl Item {
    /// Create a new item with zero stock and no ledger history.
    pub fn create(id: ItemId, spec: &NewItem, created_at: DateTime<Utc>) -> DomainResult<Self> {
        spec.validate()?;
        Ok(Self {
            id,
            name: spec.name.trim().to_string(),
            unit: spec.unit.trim().to_string(),
            sku: clean_optional(&spec.sku),
            description: clean_optional(&spec.description),
            category_id: spec.category_id,
            current_quantity: 0,
            reorder_level: spec.reorder_level,
            version: 0,
            created_at,
        })
    }

    pub fn rehydrate(snapshot: ItemSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            unit: snapshot.unit,
            sku: snapshot.sku,
            description: snapshot.description,
            category_id: snapshot.category_id,
            current_quantity: snapshot.current_quantity,
            reorder_level: snapshot.reorder_level,
            version: snapshot.version,
            created_at: snapshot.created_at,
        }
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id,
            name: self.name.clone(),
            unit: self.unit.clone(),
            sku: self.sku.clone(),
            description: self.description.clone(),
            category_id: self.category_id,
            current_quantity: self.current_quantity,
            reorder_level: self.reorder_level,
            version: self.version,
            created_at: self.created_at,
        }
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn current_quantity(&self) -> i64 {
        self.current_quantity
    }

    pub fn reorder_level(&self) -> i64 {
        self.reorder_level
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Flagged when stock is at or below the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.current_quantity <= self.reorder_level
    }

    pub fn set_reorder_level(&mut self, level: i64) -> DomainResult<()> {
        check_reorder_level(level)?;
        self.reorder_level = level;
        Ok(())
    }

    pub fn update_details(&mut self, details: &ItemDetails) -> DomainResult<()> {
        details.validate()?;
        self.name = details.name.trim().to_string();
        self.unit = details.unit.trim().to_string();
        self.sku = clean_optional(&details.sku);
        self.description = clean_optional(&details.description);
        self.category_id = details.category_id;
        Ok(())
    }

    /// Drop the category link when the category itself is deleted.
    pub fn clear_category(&mut self) {
        self.category_id = None;
    }

    /// Target quantity and delta for a movement, without mutating.
    fn next_quantity(&self, kind: MovementKind, quantity: i64) -> DomainResult<i64> {
        match kind {
            MovementKind::In | MovementKind::Out if quantity <= 0 => Err(
                DomainError::invalid_quantity(format!("{kind} quantity must be positive (got {quantity})")),
            ),
            MovementKind::Adjustment if quantity < 0 => Err(DomainError::invalid_quantity(
                format!("adjustment target cannot be negative (got {quantity})"),
            )),
            MovementKind::In => self
                .current_quantity
                .checked_add(quantity)
                .ok_or_else(|| DomainError::invalid_quantity("quantity overflow")),
            MovementKind::Out => {
                if quantity > self.current_quantity {
                    Err(DomainError::insufficient_stock(self.current_quantity, quantity))
                } else {
                    Ok(self.current_quantity - quantity)
                }
            }
            MovementKind::Adjustment => Ok(quantity),
        }
    }
}

impl AggregateRoot for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Item {
    type Command = RecordMovement;
    type Event = LedgerEntry;
    type Error = DomainError;

    fn apply(&mut self, entry: &Self::Event) {
        self.current_quantity += entry.delta;
        debug_assert_eq!(self.current_quantity, entry.resulting_quantity);
        self.version += 1;
    }

    fn decide(&self, cmd: &Self::Command) -> Result<Self::Event, Self::Error> {
        if cmd.item_id != self.id {
            return Err(DomainError::validation("movement addressed to a different item"));
        }

        let resulting = self.next_quantity(cmd.kind, cmd.quantity)?;

        Ok(LedgerEntry {
            id: cmd.entry_id,
            item_id: self.id,
            sequence: self.version + 1,
            kind: cmd.kind,
            quantity: cmd.quantity,
            delta: resulting - self.current_quantity,
            resulting_quantity: resulting,
            location_id: cmd.location_id,
            project_id: cmd.project_id,
            actor_id: cmd.actor_id,
            note: clean_optional(&cmd.note),
            occurred_at: cmd.occurred_at,
        })
    }
}

/// Item listing filter (category, free text, low-stock flag).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    #[serde(default)]
    pub low_stock_only: bool,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        if self.category_id.is_some() && self.category_id != item.category_id {
            return false;
        }
        if self.low_stock_only && !item.is_low_stock() {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                let hit = |s: Option<&str>| s.is_some_and(|s| s.to_lowercase().contains(&term));
                hit(Some(item.name())) || hit(item.sku()) || hit(item.description())
            }
        }
    }
}

fn require_text(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Reorder levels are non-negative stock counts.
pub fn check_reorder_level(level: i64) -> DomainResult<()> {
    if level < 0 {
        return Err(DomainError::validation("reorder level cannot be negative"));
    }
    Ok(())
}

fn clean_optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
