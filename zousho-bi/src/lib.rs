//! zousho-bi library interface
//!
//! Book ingest: per-provider lookup scheduling, record merging, series
//! volume grouping, and the HTTP API over them. Exposed as a library for
//! integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod series;
pub mod services;
pub mod sources;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use zousho_common::events::EventBus;

use crate::services::BookLookupService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub lookups: Arc<BookLookupService>,
    /// Queue activity from every scheduler
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(lookups: Arc<BookLookupService>, event_bus: EventBus) -> Self {
        Self {
            lookups,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::lookup_routes())
        .merge(api::series_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
