//! `sitestock-auth`: caller identity and role-based authorization.
//!
//! Authentication itself happens upstream; this crate only models the
//! identity it hands over and checks roles against permissions.

pub mod actor;
pub mod authorize;
pub mod permissions;
pub mod roles;

pub use actor::{Actor, RequestContext};
pub use authorize::{authorize, AuthzError};
pub use permissions::Permission;
pub use roles::{Role, UnknownRole};
