//! Request identity as forwarded by the upstream auth proxy.
//!
//! The proxy authenticates the user and passes the result in two headers.
//! This service trusts them; it only checks that they are present and well formed.

use axum::http::HeaderMap;

use sitestock_auth::{Actor, RequestContext, Role};
use sitestock_core::UserId;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Why a request carried no usable identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    Missing(&'static str),
    Malformed(&'static str),
}

impl core::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IdentityError::Missing(h) => write!(f, "missing {h} header"),
            IdentityError::Malformed(h) => write!(f, "malformed {h} header"),
        }
    }
}

/// Build the per-request context from identity headers.
pub fn context_from_headers(headers: &HeaderMap) -> Result<RequestContext, IdentityError> {
    let user_id: UserId = header(headers, ACTOR_ID_HEADER)?
        .parse()
        .map_err(|_| IdentityError::Malformed(ACTOR_ID_HEADER))?;
    let role: Role = header(headers, ACTOR_ROLE_HEADER)?
        .parse()
        .map_err(|_| IdentityError::Malformed(ACTOR_ROLE_HEADER))?;

    let ctx = RequestContext::new(Actor::new(user_id, role));
    Ok(match headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
        Some(id) if !id.trim().is_empty() => ctx.with_request_id(id.trim()),
        _ => ctx,
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, IdentityError> {
    let value = headers
        .get(name)
        .ok_or(IdentityError::Missing(name))?
        .to_str()
        .map_err(|_| IdentityError::Malformed(name))?
        .trim();
    if value.is_empty() {
        return Err(IdentityError::Missing(name));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_actor_headers() {
        let user = UserId::new();
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_ID_HEADER, HeaderValue::from_str(&user.to_string()).unwrap());
        headers.insert(ACTOR_ROLE_HEADER, HeaderValue::from_static("Admin"));
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-42"));

        let ctx = context_from_headers(&headers).unwrap();
        assert_eq!(ctx.user_id(), user);
        assert_eq!(ctx.role(), Role::Admin);
        assert_eq!(ctx.request_id(), Some("req-42"));
    }

    #[test]
    fn missing_or_bad_headers_are_rejected() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            context_from_headers(&headers),
            Err(IdentityError::Missing(ACTOR_ID_HEADER))
        );

        headers.insert(ACTOR_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        headers.insert(ACTOR_ROLE_HEADER, HeaderValue::from_static("staff"));
        assert_eq!(
            context_from_headers(&headers),
            Err(IdentityError::Malformed(ACTOR_ID_HEADER))
        );

        headers.insert(
            ACTOR_ID_HEADER,
            HeaderValue::from_str(&UserId::new().to_string()).unwrap(),
        );
        headers.insert(ACTOR_ROLE_HEADER, HeaderValue::from_static("owner"));
        assert_eq!(
            context_from_headers(&headers),
            Err(IdentityError::Malformed(ACTOR_ROLE_HEADER))
        );
    }
}
