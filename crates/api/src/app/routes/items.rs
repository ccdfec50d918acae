use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use sitestock_auth::RequestContext;
use sitestock_core::ItemId;
use sitestock_inventory::NewItem;

use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/threshold", put(set_threshold))
        .route("/:id/movements", post(apply_movement))
        .route("/:id/ledger", get(list_ledger))
        .route("/:id/reconcile", get(reconcile))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<dto::CreateItemRequest>,
) -> axum::response::Response {
    let spec = match NewItem::try_from(body) {
        Ok(spec) => spec,
        Err(e) => return errors::service_error_to_response(e.into()),
    };
    match services.create_item(&ctx, spec).await {
        Ok(item) => (StatusCode::CREATED, Json(dto::ItemResponse::from(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(query): ApiQuery<dto::ItemListQuery>,
) -> axum::response::Response {
    match services.list_items(&ctx, &query.into()).await {
        Ok(items) => Json(items.iter().map(dto::ItemResponse::from).collect::<Vec<_>>()).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.get_item(&ctx, id).await {
        Ok(item) => Json(dto::ItemResponse::from(&item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::UpdateItemRequest>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.update_item(&ctx, id, body.into()).await {
        Ok(item) => Json(dto::ItemResponse::from(&item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.delete_item(&ctx, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn set_threshold(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::ThresholdRequest>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.set_threshold(&ctx, id, body.reorder_level).await {
        Ok(item) => Json(dto::ItemResponse::from(&item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn apply_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::MovementBody>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let req = match body.into_request(id) {
        Ok(req) => req,
        Err(e) => return errors::service_error_to_response(e.into()),
    };
    match services.apply_movement(&ctx, req).await {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiQuery(page): ApiQuery<dto::PageQuery>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let window = services.window(page.offset, page.limit);
    match services.list_ledger(&ctx, id, window).await {
        Ok(page) => Json(dto::PageResponse::from(page)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.reconcile(&ctx, id).await {
        Ok(report) => Json(serde_json::json!({
            "item_id": report.item_id,
            "stored_quantity": report.stored_quantity,
            "ledger_quantity": report.ledger_quantity,
            "entry_count": report.entry_count,
            "version": report.version,
            "consistent": report.is_consistent(),
            "drift": report.drift(),
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
