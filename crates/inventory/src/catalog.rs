//! Reference entities that items and movements point at.
//!
//! Movements only check that these exist; nothing here owns stock.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitestock_core::{CategoryId, DomainError, DomainResult, LocationId, ProjectId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Category {
    pub fn create(id: CategoryId, spec: &NewCategory, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required("category name", &spec.name)?,
            description: optional(&spec.description),
            created_at: now,
        })
    }

    /// Replace the editable fields; `id` and `created_at` stay.
    pub fn update(&mut self, changes: &NewCategory) -> DomainResult<()> {
        self.name = required("category name", &changes.name)?;
        self.description = optional(&changes.description);
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    #[default]
    Warehouse,
    Site,
    Yard,
    Other,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Warehouse => "warehouse",
            LocationKind::Site => "site",
            LocationKind::Yard => "yard",
            LocationKind::Other => "other",
        }
    }
}

impl FromStr for LocationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warehouse" => Ok(LocationKind::Warehouse),
            "site" => Ok(LocationKind::Site),
            "yard" => Ok(LocationKind::Yard),
            "other" => Ok(LocationKind::Other),
            other => Err(DomainError::validation(format!("unknown location kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub address: Option<String>,
    pub kind: LocationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub kind: LocationKind,
}

impl Location {
    pub fn create(id: LocationId, spec: &NewLocation, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required("location name", &spec.name)?,
            address: optional(&spec.address),
            kind: spec.kind,
            created_at: now,
        })
    }

    pub fn update(&mut self, changes: &NewLocation) -> DomainResult<()> {
        self.name = required("location name", &changes.name)?;
        self.address = optional(&changes.address);
        self.kind = changes.kind;
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    #[default]
    Active,
    OnHold,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(ProjectStatus::Planning),
            "active" => Ok(ProjectStatus::Active),
            "on_hold" => Ok(ProjectStatus::OnHold),
            "completed" => Ok(ProjectStatus::Completed),
            other => Err(DomainError::validation(format!("unknown project status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub location_id: Option<LocationId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub location_id: Option<LocationId>,
}

impl Project {
    pub fn create(id: ProjectId, spec: &NewProject, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required("project name", &spec.name)?,
            code: required("project code", &spec.code)?,
            description: optional(&spec.description),
            status: spec.status,
            location_id: spec.location_id,
            created_at: now,
        })
    }

    pub fn update(&mut self, changes: &NewProject) -> DomainResult<()> {
        let name = required("project name", &changes.name)?;
        let code = required("project code", &changes.code)?;
        self.name = name;
        self.code = code;
        self.description = optional(&changes.description);
        self.status = changes.status;
        self.location_id = changes.location_id;
        Ok(())
    }

    /// Counts towards the dashboard's active-project figure.
    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(v.to_string())
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
