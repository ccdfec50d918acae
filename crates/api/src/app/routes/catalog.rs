//! Categories, locations and projects: create, list, get, update, delete.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use sitestock_auth::RequestContext;
use sitestock_core::{CategoryId, LocationId, ProjectId};
use sitestock_inventory::{NewCategory, NewLocation, NewProject};

use crate::app::errors;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;

pub fn categories_router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

pub fn locations_router() -> Router {
    Router::new()
        .route("/", get(list_locations).post(create_location))
        .route(
            "/:id",
            get(get_location).put(update_location).delete(delete_location),
        )
}

pub fn projects_router() -> Router {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
}

fn created<T: serde::Serialize>(
    result: sitestock_infra::LedgerResult<T>,
) -> axum::response::Response {
    match result {
        Ok(v) => (StatusCode::CREATED, Json(v)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

fn no_content(result: sitestock_infra::LedgerResult<()>) -> axum::response::Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

fn ok<T: serde::Serialize>(result: sitestock_infra::LedgerResult<T>) -> axum::response::Response {
    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<NewCategory>,
) -> axum::response::Response {
    created(services.create_category(&ctx, body).await)
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    ok(services.list_categories(&ctx).await)
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match errors::parse_id::<CategoryId>(&id) {
        Ok(id) => ok(services.get_category(&ctx, id).await),
        Err(resp) => resp,
    }
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<NewCategory>,
) -> axum::response::Response {
    match errors::parse_id::<CategoryId>(&id) {
        Ok(id) => ok(services.update_category(&ctx, id, body).await),
        Err(resp) => resp,
    }
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match errors::parse_id::<CategoryId>(&id) {
        Ok(id) => no_content(services.delete_category(&ctx, id).await),
        Err(resp) => resp,
    }
}

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<NewLocation>,
) -> axum::response::Response {
    created(services.create_location(&ctx, body).await)
}

pub async fn list_locations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    ok(services.list_locations(&ctx).await)
}

pub async fn get_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match errors::parse_id::<LocationId>(&id) {
        Ok(id) => ok(services.get_location(&ctx, id).await),
        Err(resp) => resp,
    }
}

pub async fn update_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<NewLocation>,
) -> axum::response::Response {
    match errors::parse_id::<LocationId>(&id) {
        Ok(id) => ok(services.update_location(&ctx, id, body).await),
        Err(resp) => resp,
    }
}

pub async fn delete_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match errors::parse_id::<LocationId>(&id) {
        Ok(id) => no_content(services.delete_location(&ctx, id).await),
        Err(resp) => resp,
    }
}

pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<NewProject>,
) -> axum::response::Response {
    created(services.create_project(&ctx, body).await)
}

pub async fn list_projects(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    ok(services.list_projects(&ctx).await)
}

pub async fn get_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match errors::parse_id::<ProjectId>(&id) {
        Ok(id) => ok(services.get_project(&ctx, id).await),
        Err(resp) => resp,
    }
}

pub async fn update_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<NewProject>,
) -> axum::response::Response {
    match errors::parse_id::<ProjectId>(&id) {
        Ok(id) => ok(services.update_project(&ctx, id, body).await),
        Err(resp) => resp,
    }
}

pub async fn delete_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match errors::parse_id::<ProjectId>(&id) {
        Ok(id) => no_content(services.delete_project(&ctx, id).await),
        Err(resp) => resp,
    }
}
