use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use sitestock_auth::RequestContext;

use crate::app::extract::ApiQuery;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(list_audit))
}

/// Audit history, most recent first. Admin only (enforced by the service).
pub async fn list_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(query): ApiQuery<dto::AuditListQuery>,
) -> axum::response::Response {
    let window = services.window(query.offset, query.limit);
    match services.list_audit(&ctx, &query.filter(), window).await {
        Ok(page) => Json(dto::PageResponse::from(page)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
