//! Dashboard figures derived from items, catalog and ledger.
//!
//! Pure aggregation; backends only supply the rows and the per-project sums.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sitestock_core::{CategoryId, Page, ProjectId};

use crate::catalog::{Category, Project};
use crate::item::Item;
use crate::movement::{LedgerEntry, MovementKind};

/// Units booked in and out against one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTotals {
    pub project_id: ProjectId,
    pub total_in: i64,
    pub total_out: i64,
}

/// Per-project `in`/`out` sums over `entries`, ordered by project id.
///
/// Adjustments are corrections, not deliveries or withdrawals, and are skipped.
pub fn project_totals<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Vec<ProjectTotals> {
    let mut sums: BTreeMap<ProjectId, (i64, i64)> = BTreeMap::new();
    for entry in entries {
        let Some(project_id) = entry.project_id else {
            continue;
        };
        let (total_in, total_out) = sums.entry(project_id).or_default();
        match entry.kind {
            MovementKind::In => *total_in = total_in.saturating_add(entry.quantity),
            MovementKind::Out => *total_out = total_out.saturating_add(entry.quantity),
            MovementKind::Adjustment => {}
        }
    }
    sums.into_iter()
        .map(|(project_id, (total_in, total_out))| ProjectTotals {
            project_id,
            total_in,
            total_out,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category_id: CategoryId,
    pub name: String,
    pub item_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUsage {
    pub project_id: ProjectId,
    pub name: String,
    pub total_in: i64,
    pub total_out: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_items: u64,
    pub low_stock_items: u64,
    pub total_projects: u64,
    pub active_projects: u64,
    pub total_locations: u64,
    pub total_transactions: u64,
    /// Every category, including empty ones, ordered by name.
    pub items_per_category: Vec<CategoryCount>,
    pub uncategorized_items: u64,
    /// Movement sums for active projects, ordered by project name.
    pub active_project_usage: Vec<ProjectUsage>,
    /// Newest ledger entries; `total_transactions` is the full ledger size.
    pub recent_movements: Vec<LedgerEntry>,
}

impl InventorySummary {
    pub fn compile(
        items: &[Item],
        categories: &[Category],
        projects: &[Project],
        location_count: usize,
        recent: Page<LedgerEntry>,
        totals: &[ProjectTotals],
    ) -> Self {
        let mut per_category: BTreeMap<CategoryId, u64> = BTreeMap::new();
        let mut uncategorized_items = 0;
        for item in items {
            match item.category_id() {
                Some(id) => *per_category.entry(id).or_default() += 1,
                None => uncategorized_items += 1,
            }
        }

        let mut items_per_category: Vec<CategoryCount> = categories
            .iter()
            .map(|c| CategoryCount {
                category_id: c.id,
                name: c.name.clone(),
                item_count: per_category.get(&c.id).copied().unwrap_or(0),
            })
            .collect();
        items_per_category.sort_by(|a, b| a.name.cmp(&b.name));

        let mut active_project_usage: Vec<ProjectUsage> = projects
            .iter()
            .filter(|p| p.is_active())
            .map(|p| {
                let sums = totals.iter().find(|t| t.project_id == p.id);
                ProjectUsage {
                    project_id: p.id,
                    name: p.name.clone(),
                    total_in: sums.map_or(0, |t| t.total_in),
                    total_out: sums.map_or(0, |t| t.total_out),
                }
            })
            .collect();
        active_project_usage.sort_by(|a, b| a.name.cmp(&b.name));

        InventorySummary {
            total_items: items.len() as u64,
            low_stock_items: items.iter().filter(|i| i.is_low_stock()).count() as u64,
            total_projects: projects.len() as u64,
            active_projects: active_project_usage.len() as u64,
            total_locations: location_count as u64,
            total_transactions: recent.total,
            items_per_category,
            uncategorized_items,
            active_project_usage,
            recent_movements: recent.items,
        }
    }
}
