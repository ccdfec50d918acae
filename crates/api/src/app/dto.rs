use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use sitestock_audit::{ActionKind, AuditFilter, TargetType};
use sitestock_core::{
    AggregateRoot, CategoryId, DomainError, ItemId, LocationId, Page, ProjectId, UserId,
};
use sitestock_inventory::{
    Item, ItemDetails, ItemFilter, LedgerFilter, MovementKind, NewItem,
};
use sitestock_infra::MovementRequest;

// -------------------------
// Request DTOs
// -------------------------

/// Quantities arrive as raw JSON so a fractional or non-numeric value is
/// reported as `invalid_quantity` instead of a generic body error.
fn whole_quantity(field: &str, value: &JsonValue) -> Result<i64, DomainError> {
    value.as_i64().ok_or_else(|| {
        DomainError::invalid_quantity(format!("{field} must be a whole number, got {value}"))
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub initial_quantity: Option<JsonValue>,
    #[serde(default)]
    pub reorder_level: i64,
}

impl TryFrom<CreateItemRequest> for NewItem {
    type Error = DomainError;

    fn try_from(r: CreateItemRequest) -> Result<Self, Self::Error> {
        let initial_quantity = match &r.initial_quantity {
            Some(value) => whole_quantity("initial_quantity", value)?,
            None => 0,
        };
        Ok(NewItem {
            name: r.name,
            unit: r.unit,
            sku: r.sku,
            description: r.description,
            category_id: r.category_id,
            initial_quantity,
            reorder_level: r.reorder_level,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl From<UpdateItemRequest> for ItemDetails {
    fn from(r: UpdateItemRequest) -> Self {
        ItemDetails {
            name: r.name,
            unit: r.unit,
            sku: r.sku,
            description: r.description,
            category_id: r.category_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ThresholdRequest {
    pub reorder_level: i64,
}

/// Body of `POST /items/:id/movements`; the item comes from the path.
#[derive(Debug, Deserialize)]
pub struct MovementBody {
    pub kind: MovementKind,
    pub quantity: JsonValue,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub note: Option<String>,
}

impl MovementBody {
    pub fn into_request(self, item_id: ItemId) -> Result<MovementRequest, DomainError> {
        Ok(MovementRequest {
            item_id,
            kind: self.kind,
            quantity: whole_quantity("quantity", &self.quantity)?,
            location_id: self.location_id,
            project_id: self.project_id,
            note: self.note,
        })
    }
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
}

impl From<ItemListQuery> for ItemFilter {
    fn from(q: ItemListQuery) -> Self {
        ItemFilter {
            category_id: q.category_id,
            search: q.search,
            low_stock_only: q.low_stock,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementListQuery {
    pub item_id: Option<ItemId>,
    pub kind: Option<MovementKind>,
    pub location_id: Option<LocationId>,
    pub project_id: Option<ProjectId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl MovementListQuery {
    pub fn filter(&self) -> LedgerFilter {
        LedgerFilter {
            item_id: self.item_id,
            kind: self.kind,
            location_id: self.location_id,
            project_id: self.project_id,
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditListQuery {
    pub action: Option<ActionKind>,
    pub target_type: Option<TargetType>,
    pub target_id: Option<String>,
    pub actor_id: Option<UserId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl AuditListQuery {
    pub fn filter(&self) -> AuditFilter {
        AuditFilter {
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id.clone(),
            actor_id: self.actor_id,
            from: self.from,
            to: self.to,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: ItemId,
    pub name: String,
    pub unit: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub current_quantity: i64,
    pub reorder_level: i64,
    pub low_stock: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&Item> for ItemResponse {
    fn from(item: &Item) -> Self {
        ItemResponse {
            id: item.id_typed(),
            name: item.name().to_string(),
            unit: item.unit().to_string(),
            sku: item.sku().map(str::to_string),
            description: item.description().map(str::to_string),
            category_id: item.category_id(),
            current_quantity: item.current_quantity(),
            reorder_level: item.reorder_level(),
            low_stock: item.is_low_stock(),
            version: item.version(),
            created_at: item.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        let has_more = page.has_more();
        PageResponse {
            offset: page.window.offset,
            limit: page.window.limit,
            total: page.total,
            items: page.items,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(quantity: JsonValue) -> MovementBody {
        serde_json::from_value(json!({ "kind": "in", "quantity": quantity })).unwrap()
    }

    #[test]
    fn fractional_or_textual_quantities_are_invalid_quantity() {
        let item_id = ItemId::new();
        assert_eq!(body(json!(4)).into_request(item_id).unwrap().quantity, 4);
        for bad in [json!(2.5), json!("3"), json!(null)] {
            let err = body(bad.clone()).into_request(item_id).unwrap_err();
            assert!(matches!(err, DomainError::InvalidQuantity(_)), "{bad}");
        }
    }

    #[test]
    fn missing_initial_quantity_means_zero() {
        let req: CreateItemRequest =
            serde_json::from_value(json!({ "name": "Sand", "unit": "t" })).unwrap();
        assert_eq!(NewItem::try_from(req).unwrap().initial_quantity, 0);
    }
}
