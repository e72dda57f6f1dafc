//! Liveness endpoint

use axum::{extract::State, http::StatusCode, routing::get, Router};

use crate::AppState;

/// GET /health
///
/// 204 with no body while healthy, 503 once shutdown has begun.
pub async fn health_check(State(state): State<AppState>) -> StatusCode {
    if state.shared.is_healthy() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
