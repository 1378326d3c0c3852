//! # leadline-api
//!
//! HTTP surface for the lead interaction timeline.
//!
//! Routes:
//! - `GET /health`
//! - `GET /lead/:lead_id/timeline?from=&to=&type=&limit=&cursor=`
//!
//! The timeline route requires an actor, forwarded by the authenticating
//! gateway as trusted headers (see [`middleware::actor_context`]).

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use leadline_core::TimelineEngine;
use leadline_db::Database;

use middleware::actor_context::{CAPABILITIES_HEADER, TENANT_HEADER, USER_HEADER};

pub mod handlers;
pub mod middleware;
pub mod query_types;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TimelineEngine>,
    /// Present when backed by PostgreSQL; used for pool diagnostics.
    pub db: Option<Database>,
}

impl AppState {
    pub fn new(engine: TimelineEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }
}

/// Build the application routes. Transport layers (tracing, request ids,
/// CORS) are added by the binary.
pub fn router(state: AppState) -> Router {
    let timeline = Router::new()
        .route(
            "/lead/:lead_id/timeline",
            get(handlers::timeline::lead_timeline),
        )
        .route_layer(axum::middleware::from_fn(
            middleware::actor_context::actor_context,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(timeline)
        .with_state(state)
}

/// CORS policy for browser callers. The actor headers must pass preflight
/// or every cross-origin timeline request fails before reaching the route.
pub fn cors_layer(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(TENANT_HEADER),
            HeaderName::from_static(USER_HEADER),
            HeaderName::from_static(CAPABILITIES_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

/// Message for every lead the caller cannot see, present or not.
pub const LEAD_NOT_FOUND: &str = "Lead not found";

#[derive(Debug)]
pub enum ApiError {
    Internal(leadline_core::Error),
    Unauthorized(String),
    NotFound(String),
}

impl From<leadline_core::Error> for ApiError {
    fn from(err: leadline_core::Error) -> Self {
        match err {
            leadline_core::Error::LeadNotFound(_) => {
                ApiError::NotFound(LEAD_NOT_FOUND.to_string())
            }
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Timeline request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
