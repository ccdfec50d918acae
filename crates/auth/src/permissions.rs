use serde::{Deserialize, Serialize};

/// Permission checked at the service boundary.
///
/// Serialized with dotted names (e.g. `"inventory.write"`) so they read the
/// same in logs and error bodies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "inventory.read")]
    InventoryRead,
    #[serde(rename = "inventory.write")]
    InventoryWrite,
    #[serde(rename = "catalog.write")]
    CatalogWrite,
    #[serde(rename = "audit.read")]
    AuditRead,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::InventoryRead => "inventory.read",
            Permission::InventoryWrite => "inventory.write",
            Permission::CatalogWrite => "catalog.write",
            Permission::AuditRead => "audit.read",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
