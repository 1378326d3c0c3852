//! Liveness endpoint.

use axum::{extract::State, response::IntoResponse, Json};

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(db) = &state.db {
        leadline_db::log_pool_metrics(db.pool());
    }

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
