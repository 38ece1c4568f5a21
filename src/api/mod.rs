//! Read API over the search index
//!
//! ```text
//! GET /ping                  liveness, plain "pong"
//! GET /api/v1/search/all     every video, newest first (pagination-from, pagination-size)
//! GET /api/v1/search         full-text match (q)
//! GET /api/v1/health         status, version, uptime, leadership
//! GET /metrics               Prometheus exposition
//! ```
//!
//! Both search endpoints answer `{ "total_count": n, "items": [...] }`.

pub mod handlers;
pub mod server;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};

use crate::election::Elector;
use crate::metrics;
use crate::search::SearchIndex;

pub use server::{ApiServer, ServerError};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<dyn SearchIndex>,
    pub elector: Arc<dyn Elector>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(index: Arc<dyn SearchIndex>, elector: Arc<dyn Elector>) -> Self {
        Self {
            index,
            elector,
            start_time: Instant::now(),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/api/v1/search/all", get(handlers::search_all))
        .route("/api/v1/search", get(handlers::search_match))
        .route("/api/v1/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(middleware::from_fn(record_request))
        .with_state(state)
}

async fn record_request(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    metrics::record_api_request(
        &endpoint,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}
