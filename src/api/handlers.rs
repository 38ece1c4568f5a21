//! Read API handlers

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::metrics;
use crate::models::SearchPage;
use crate::search::{match_query, search_all_query, DEFAULT_PAGE_SIZE};

// ============================================================================
// Request / Response Types
// ============================================================================

/// Query string of `/api/v1/search/all`
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(rename = "pagination-from")]
    pub from: Option<String>,
    #[serde(rename = "pagination-size")]
    pub size: Option<String>,
}

impl PaginationParams {
    /// Resolve to `(from, size)`, defaulting absent or empty values
    pub fn resolve(&self) -> Result<(usize, usize), String> {
        let from = parse_param("pagination-from", self.from.as_deref(), 0)?;
        let size = parse_param("pagination-size", self.size.as_deref(), DEFAULT_PAGE_SIZE)?;
        Ok((from, size))
    }
}

fn parse_param(name: &str, value: Option<&str>, default: usize) -> Result<usize, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("invalid query params value - '{name}'")),
    }
}

/// Query string of `/api/v1/search`
#[derive(Debug, Default, Deserialize)]
pub struct MatchParams {
    pub q: Option<String>,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub is_leader: bool,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn ping() -> &'static str {
    "pong\n"
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        is_leader: state.elector.is_leader(),
    })
}

/// Every stored video, newest first, paginated
pub async fn search_all(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Response {
    let (from, size) = match params.resolve() {
        Ok(page) => page,
        Err(message) => {
            tracing::warn!(?params, "Rejected pagination parameters");
            return error_response(StatusCode::BAD_REQUEST, message);
        }
    };

    run_query(&state, search_all_query(from, size)).await
}

/// Full-text match over title and description
pub async fn search_match(
    State(state): State<AppState>,
    Query(params): Query<MatchParams>,
) -> Response {
    let q = params.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "use the /api/v1/search/all instead or pass a search query in 'q' param",
        );
    }

    run_query(&state, match_query(q)).await
}

async fn run_query(state: &AppState, query: serde_json::Value) -> Response {
    match state.index.search(query).await {
        Ok(hits) => Json(SearchPage::from(hits)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, index = %state.index.index_name(), "Search query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "unable to read queried data")
        }
    }
}

/// Prometheus text exposition
pub async fn metrics_handler() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(from: Option<&str>, size: Option<&str>) -> PaginationParams {
        PaginationParams {
            from: from.map(String::from),
            size: size.map(String::from),
        }
    }

    #[test]
    fn test_pagination_defaults() {
        assert_eq!(params(None, None).resolve(), Ok((0, 25)));
        assert_eq!(params(Some(""), Some("")).resolve(), Ok((0, 25)));
    }

    #[test]
    fn test_pagination_explicit() {
        assert_eq!(params(Some("100"), Some("30")).resolve(), Ok((100, 30)));
        assert_eq!(params(Some("10"), None).resolve(), Ok((10, 25)));
    }

    #[test]
    fn test_pagination_rejects_non_integers() {
        let err = params(Some("ten"), None).resolve().unwrap_err();
        assert!(err.contains("pagination-from"));

        let err = params(None, Some("2.5")).resolve().unwrap_err();
        assert!(err.contains("pagination-size"));

        assert!(params(Some("-1"), None).resolve().is_err());
    }
}
