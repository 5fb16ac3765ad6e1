//! ISBN lookup endpoints
//!
//! - `POST /lookups` queues ISBNs with every provider
//! - `GET /lookups/:isbn` returns the merged state
//! - `GET /queues` summarizes each provider's queue

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use zousho_common::Isbn;

use crate::scheduler::EnqueueMode;
use crate::services::{LookupState, QueueSnapshot};
use crate::{ApiError, ApiResult, AppState};

/// Request payload for queueing lookups
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    /// Raw ISBN-10 or ISBN-13 strings, separators allowed
    pub isbns: Vec<String>,
    #[serde(default)]
    pub mode: EnqueueMode,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    /// Canonical ISBN-13s of every input that validated
    pub accepted: Vec<Isbn>,
    /// Accepted ISBNs whose position changed in at least one provider queue;
    /// a repeated `new` request for a queued or settled ISBN changes nothing
    pub queued: Vec<Isbn>,
    /// Inputs that did not validate
    pub rejected: Vec<String>,
}

/// POST /lookups
///
/// **Request:** `{"isbns": ["4-08-872509-3"], "mode": "priority"}`
///
/// **Errors:**
/// - 400 Bad Request: no input validated
pub async fn enqueue_lookups(
    State(state): State<AppState>,
    Json(payload): Json<EnqueueRequest>,
) -> ApiResult<Json<EnqueueResponse>> {
    let mut accepted: Vec<Isbn> = Vec::new();
    let mut rejected = Vec::new();
    for raw in payload.isbns {
        match Isbn::parse(&raw) {
            Some(isbn) if !accepted.contains(&isbn) => accepted.push(isbn),
            Some(_) => {}
            None => rejected.push(raw),
        }
    }

    if accepted.is_empty() {
        return Err(ApiError::BadRequest("No valid ISBN in request".to_string()));
    }

    let queued = state.lookups.enqueue(&accepted, payload.mode).await;
    info!(
        accepted = accepted.len(),
        queued = queued.len(),
        rejected = rejected.len(),
        mode = ?payload.mode,
        "Lookups requested"
    );

    Ok(Json(EnqueueResponse {
        accepted,
        queued,
        rejected,
    }))
}

/// GET /lookups/:isbn
pub async fn get_lookup(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<LookupState>> {
    let isbn = Isbn::parse(&raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid ISBN: {}", raw)))?;

    state
        .lookups
        .lookup_state(&isbn)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No lookup queued for {}", isbn)))
}

/// GET /queues
pub async fn get_queues(State(state): State<AppState>) -> Json<Vec<QueueSnapshot>> {
    Json(state.lookups.queue_snapshots().await)
}

/// Build lookup routes
pub fn lookup_routes() -> Router<AppState> {
    Router::new()
        .route("/lookups", post(enqueue_lookups))
        .route("/lookups/:isbn", get(get_lookup))
        .route("/queues", get(get_queues))
}
