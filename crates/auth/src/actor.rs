use serde::{Deserialize, Serialize};

use sitestock_core::UserId;

use crate::Role;

/// An authenticated user as vouched for by the identity provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn staff(user_id: UserId) -> Self {
        Self::new(user_id, Role::Staff)
    }
}

/// Per-call request context.
///
/// Every mutating and reading operation takes one of these explicitly; there
/// is no process-wide "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    actor: Actor,
    request_id: Option<String>,
}

impl RequestContext {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn actor(&self) -> Actor {
        self.actor
    }

    pub fn user_id(&self) -> UserId {
        self.actor.user_id
    }

    pub fn role(&self) -> Role {
        self.actor.role
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}
