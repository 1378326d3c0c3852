//! Actor context middleware.
//!
//! The authenticating gateway in front of this service forwards the caller
//! as trusted headers. This middleware parses them into an [`Actor`] and
//! inserts it into the request extensions, where handlers read it with
//! `Extension<Actor>`.
//!
//! | Header           | Value                                          |
//! |------------------|------------------------------------------------|
//! | `x-tenant-id`    | tenant UUID                                    |
//! | `x-user-id`      | user UUID                                      |
//! | `x-capabilities` | capability keys, comma or space separated; `*` grants all |
//!
//! A missing or malformed tenant or user id is rejected with 401.

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use uuid::Uuid;

use crate::ApiError;
use leadline_core::Actor;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";
pub const CAPABILITIES_HEADER: &str = "x-capabilities";

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, ApiError> {
    let value = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", name)))?;

    Uuid::parse_str(value).map_err(|_| ApiError::Unauthorized(format!("Invalid {} header", name)))
}

/// Parse the actor headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let tenant_id = header_uuid(headers, TENANT_HEADER)?;
    let user_id = header_uuid(headers, USER_HEADER)?;

    let capabilities = headers
        .get(CAPABILITIES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(Actor::new(user_id, tenant_id, capabilities))
}

/// Middleware: attach the [`Actor`] or reject the request.
pub async fn actor_context(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let actor = actor_from_headers(request.headers())?;
    tracing::debug!(
        subsystem = "api",
        component = "actor_context",
        tenant_id = %actor.tenant_id,
        user_id = %actor.user_id,
        capabilities = actor.capabilities.len(),
        "Actor resolved"
    );
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}
