use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use sitestock_core::{AuditId, DomainError, UserId};

/// What was done to the target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        }
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ActionKind::Create),
            "update" => Ok(ActionKind::Update),
            "delete" => Ok(ActionKind::Delete),
            other => Err(DomainError::validation(format!("unknown action kind '{other}'"))),
        }
    }
}

/// Kind of entity an audit record points at.
///
/// Wire names match the table names the dashboard has always logged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Items,
    InventoryTransactions,
    Categories,
    Locations,
    Projects,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Items => "items",
            TargetType::InventoryTransactions => "inventory_transactions",
            TargetType::Categories => "categories",
            TargetType::Locations => "locations",
            TargetType::Projects => "projects",
        }
    }
}

impl core::fmt::Display for TargetType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "items" => TargetType::Items,
            "inventory_transactions" => TargetType::InventoryTransactions,
            "categories" => TargetType::Categories,
            "locations" => TargetType::Locations,
            "projects" => TargetType::Projects,
            other => return Err(DomainError::validation(format!("unknown target type '{other}'"))),
        })
    }
}

/// Append-only record of who changed what.
///
/// `target_id` is a weak reference: the target may since have been deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub actor_id: UserId,
    pub action: ActionKind,
    pub target_type: TargetType,
    pub target_id: String,
    pub recorded_at: DateTime<Utc>,
    pub snapshot: JsonValue,
}

impl AuditRecord {
    pub fn new(
        actor_id: UserId,
        action: ActionKind,
        target_type: TargetType,
        target_id: impl core::fmt::Display,
        snapshot: JsonValue,
    ) -> Self {
        Self {
            id: AuditId::new(),
            actor_id,
            action,
            target_type,
            target_id: target_id.to_string(),
            recorded_at: Utc::now(),
            snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_type_wire_names_round_trip() {
        for t in [
            TargetType::Items,
            TargetType::InventoryTransactions,
            TargetType::Categories,
            TargetType::Locations,
            TargetType::Projects,
        ] {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(t.as_str().parse::<TargetType>().unwrap(), t);
        }
        // Nothing here writes users or settings.
        assert!("users".parse::<TargetType>().is_err());
    }

    #[test]
    fn unknown_action_is_validation_error() {
        assert!(matches!(
            "archive".parse::<ActionKind>(),
            Err(DomainError::Validation(_))
        ));
    }
}
