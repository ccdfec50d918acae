use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use sitestock_auth::RequestContext;

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "actor_id": ctx.user_id().to_string(),
        "role": ctx.role().as_str(),
        "permissions": ctx.role().permissions().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        "audit_failures": services.audit_failures(),
    }))
}

/// Dashboard figures: counts, per-category items, recent movements, project usage.
pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    match services.summary(&ctx).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
