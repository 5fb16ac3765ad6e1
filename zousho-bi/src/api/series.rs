//! Series grouping endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use zousho_common::BookRecord;

use crate::series::{group_by_volume, SeriesGroup};
use crate::services::SeriesSearchState;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub records: Vec<BookRecord>,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub groups: Vec<SeriesGroup>,
}

/// POST /series/group
///
/// Groups caller-supplied records without touching any provider.
pub async fn group_records(Json(payload): Json<GroupRequest>) -> Json<GroupResponse> {
    Json(GroupResponse {
        groups: group_by_volume(&payload.records),
    })
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// POST /series/search
///
/// **Errors:**
/// - 400 Bad Request: blank query
/// - 503 Service Unavailable: no provider supports title search
pub async fn start_search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> ApiResult<StatusCode> {
    if payload.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query cannot be empty".to_string()));
    }
    if !state.lookups.search_series(&payload.query).await {
        return Err(ApiError::Unavailable(
            "Series search requires the Google Books provider".to_string(),
        ));
    }
    Ok(StatusCode::ACCEPTED)
}

/// GET /series/search/:query
pub async fn get_search(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> ApiResult<Json<SeriesSearchState>> {
    state
        .lookups
        .series_groups(&query)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No series search for '{}'", query)))
}

/// Build series routes
pub fn series_routes() -> Router<AppState> {
    Router::new()
        .route("/series/group", post(group_records))
        .route("/series/search", post(start_search))
        .route("/series/search/:query", get(get_search))
}
