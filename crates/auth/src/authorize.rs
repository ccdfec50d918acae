use thiserror::Error;

use crate::{Permission, RequestContext, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: Role, permission: Permission },
}

/// Check that the caller's role grants `required`.
///
/// - No IO
/// - No panics
/// - Pure policy check; the identity itself is trusted as supplied
pub fn authorize(ctx: &RequestContext, required: Permission) -> Result<(), AuthzError> {
    let role = ctx.role();
    if role.grants(required) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %ctx.user_id(),
            role = %role,
            permission = %required,
            "authorization denied"
        );
        Err(AuthzError::Forbidden {
            role,
            permission: required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Actor;
    use sitestock_core::UserId;

    fn ctx(role: Role) -> RequestContext {
        RequestContext::new(Actor::new(UserId::new(), role))
    }

    #[test]
    fn staff_can_move_stock_but_not_read_audit() {
        let staff = ctx(Role::Staff);
        assert!(authorize(&staff, Permission::InventoryWrite).is_ok());
        assert_eq!(
            authorize(&staff, Permission::AuditRead),
            Err(AuthzError::Forbidden {
                role: Role::Staff,
                permission: Permission::AuditRead,
            })
        );
    }

    #[test]
    fn admin_has_every_permission() {
        let admin = ctx(Role::Admin);
        for p in [
            Permission::InventoryRead,
            Permission::InventoryWrite,
            Permission::CatalogWrite,
            Permission::AuditRead,
        ] {
            assert!(authorize(&admin, p).is_ok(), "admin denied {p}");
        }
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!("manager".parse::<Role>().is_err());
    }

    #[test]
    fn permission_serializes_with_dotted_name() {
        let json = serde_json::to_string(&Permission::AuditRead).unwrap();
        assert_eq!(json, "\"audit.read\"");
    }
}
