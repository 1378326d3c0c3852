//! `GET /lead/:lead_id/timeline`

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::query_types::TimelineParams;
use crate::{ApiError, AppState, LEAD_NOT_FOUND};
use leadline_core::{Actor, TimelineRequest, TimelineResponse};

/// Assemble one page of the lead's interaction timeline.
///
/// A lead id that is not a UUID gets the same 404 as a lead that does not
/// exist or that the actor may not read. The query is taken as raw pairs so
/// repeated keys never fail extraction.
pub async fn lead_timeline(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(lead_id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<TimelineResponse>, ApiError> {
    let lead_id = Uuid::parse_str(lead_id.trim())
        .map_err(|_| ApiError::NotFound(LEAD_NOT_FOUND.to_string()))?;
    let request = TimelineRequest::from(TimelineParams::from_pairs(pairs));

    let response = state
        .engine
        .timeline(&actor, lead_id, &request, Utc::now())
        .await?;

    Ok(Json(response))
}
