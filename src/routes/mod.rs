// HTTP routes

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregator::Aggregator;
use crate::auth::SessionVerifier;
use crate::error::StatsError;

#[derive(Clone)]
pub(crate) struct AppState {
    /// Backend chosen at startup, or the configuration error every stats request reports.
    pub(crate) aggregator: Arc<Result<Aggregator, String>>,
    pub(crate) verifier: Arc<dyn SessionVerifier>,
}

pub fn app(
    aggregator: Result<Aggregator, StatsError>,
    verifier: Arc<dyn SessionVerifier>,
) -> Router {
    let state = AppState {
        aggregator: Arc::new(aggregator.map_err(|e| e.to_string())),
        verifier,
    };
    Router::new()
        .route("/", get(|| async { "statsboard: server stats API" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/stats", get(http::stats_handler)) // GET /api/stats
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
