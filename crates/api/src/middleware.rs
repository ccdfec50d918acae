use axum::{
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::app::errors::json_error;
use crate::context::{context_from_headers, REQUEST_ID_HEADER};

/// Make sure every request carries an `x-request-id` and echo it back.
///
/// A non-empty id from the caller is kept; otherwise a fresh UUIDv7 is used.
pub async fn request_id_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let incoming = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|v| v.to_str().is_ok_and(|s| !s.trim().is_empty()))
        .cloned();
    let request_id = match incoming {
        Some(v) => v,
        None => match HeaderValue::from_str(&Uuid::now_v7().to_string()) {
            Ok(v) => v,
            Err(_) => return next.run(req).await,
        },
    };

    req.headers_mut().insert(REQUEST_ID_HEADER, request_id.clone());
    let mut res = next.run(req).await;
    res.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    res
}

/// Reject requests without identity headers; otherwise attach a `RequestContext`.
pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let ctx = context_from_headers(req.headers()).map_err(|e| {
        tracing::debug!(error = %e, path = %req.uri().path(), "rejecting unauthenticated request");
        json_error(StatusCode::UNAUTHORIZED, "unauthenticated", e.to_string())
    })?;

    let span = tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        actor_id = %ctx.user_id(),
        role = %ctx.role(),
        request_id = ctx.request_id().unwrap_or("-"),
    );
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).instrument(span).await)
}
