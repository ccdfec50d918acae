use axum::{routing::get, Router};

pub mod audit;
pub mod catalog;
pub mod items;
pub mod movements;
pub mod system;

/// Router for all endpoints that need a caller identity.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/summary", get(system::summary))
        .nest("/items", items::router())
        .nest("/movements", movements::router())
        .nest("/categories", catalog::categories_router())
        .nest("/locations", catalog::locations_router())
        .nest("/projects", catalog::projects_router())
        .nest("/audit", audit::router())
}
