//! Inventory domain module.
//!
//! Business rules for items, stock movements and the reference catalog,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).

pub mod catalog;
pub mod item;
pub mod movement;
pub mod summary;

pub use catalog::{
    Category, Location, LocationKind, NewCategory, NewLocation, NewProject, Project, ProjectStatus,
};
pub use item::{check_reorder_level, Item, ItemDetails, ItemFilter, ItemSnapshot, NewItem};
pub use movement::{
    newest_first, replay_quantity, LedgerEntry, LedgerFilter, MovementKind, Reconciliation,
    RecordMovement,
};
pub use summary::{
    project_totals, CategoryCount, InventorySummary, ProjectTotals, ProjectUsage,
};
