//! # WRS Word Rank Service Library (wrs-rank)
//!
//! Ingests a live stream of short text messages, tokenizes them into words
//! and keeps a continuously updated frequency ranking that clients query
//! over HTTP.
//!
//! **Write path:** stream source → [`ingest::IngestPipeline`] → tokenizer →
//! rank store.
//!
//! **Read path:** HTTP → [`query::QueryService`] → rank store.
//!
//! [`rate::RateTracker`] samples the ingestion counter on a fixed period and
//! [`lifecycle::Lifecycle`] orchestrates startup and the draining shutdown.

use axum::{body::Body, http::Request, routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod api;
pub mod ingest;
pub mod lifecycle;
pub mod query;
pub mod rate;
pub mod state;

pub use lifecycle::{Lifecycle, ShutdownReport};
pub use query::QueryService;
pub use state::SharedState;
pub use wrs_common::{Error, Result};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Process health flag
    pub shared: Arc<SharedState>,
    /// Read-only access to the rankings
    pub query: QueryService,
}

impl AppState {
    pub fn new(shared: Arc<SharedState>, query: QueryService) -> Self {
        Self { shared, query }
    }
}

/// Build application router
///
/// Every request gets an `x-request-id` (kept when the client sent one),
/// recorded on its trace span and echoed on the response.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/api/standing/top", get(api::top_ranks))
        .route("/api/standing/:id", get(api::standing))
        .route("/api/buildinfo", get(api::get_build_info));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");
                        tracing::info_span!(
                            "request",
                            request_id = %request_id,
                            method = %request.method(),
                            uri = %request.uri(),
                        )
                    }),
                )
                .layer(TimeoutLayer::new(request_timeout))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

/// Log which configuration file was used
///
/// Configuration is loaded before the subscriber is installed, so the
/// binary reports the outcome here once logging is up.
pub fn log_config_source(path: Option<&Path>) {
    match path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No configuration file found, using built-in defaults"),
    }
}
